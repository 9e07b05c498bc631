use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level configuration: one optional section per tracker.
#[derive(Debug, Deserialize, Default)]
pub struct SyncConfig {
    pub jira: Option<JiraConfig>,
    pub tapd: Option<TapdConfig>,
    pub zentao: Option<ZentaoConfig>,
}

/// How a client authenticates against its tracker. Constructed per client,
/// never shared through mutable statics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AuthConfig {
    Basic { account: String, password: String },
    Token { token: String },
    Session { account: String, password: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    pub address: String,
    #[serde(flatten)]
    pub auth: AuthConfig,
    #[serde(flatten)]
    pub project: JiraProjectConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraProjectConfig {
    /// Project key, e.g. "PROJ".
    pub project_key: String,
    /// Issue type id for bugs.
    pub bug_type_id: String,
    /// Issue type id for demands; only required by demand operations.
    pub demand_type_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TapdConfig {
    pub address: String,
    pub account: String,
    pub password: String,
    /// Workspace id.
    pub workspace_id: String,
    /// Public base URL of the host, used to rebase rich-text image links so
    /// the tracker can fetch host-served previews.
    pub host_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZentaoConfig {
    pub address: String,
    pub account: String,
    pub password: String,
    /// Either a product id ("12") or a "product-project" pair ("12-7").
    pub zentao_id: String,
}

impl JiraProjectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project_key.trim().is_empty() {
            return Err(Error::Config("jira project key is not set".into()));
        }
        if self.bug_type_id.trim().is_empty() {
            return Err(Error::Config("jira bug issue-type id is not set".into()));
        }
        Ok(())
    }

    pub fn demand_type_id(&self) -> Result<&str> {
        self.demand_type_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Config("jira demand issue-type id is not set".into()))
    }
}

impl TapdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workspace_id.trim().is_empty() {
            return Err(Error::Config("tapd workspace id is not set".into()));
        }
        Ok(())
    }
}

impl ZentaoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.zentao_id.trim().is_empty() {
            return Err(Error::Config("zentao product id is not set".into()));
        }
        Ok(())
    }

    /// Splits the configured id into (product, project). A plain id is
    /// product-scoped; "product-project" carries both.
    pub fn product_project(&self) -> (&str, Option<&str>) {
        match self.zentao_id.split_once('-') {
            Some((product, project)) if !project.is_empty() => (product, Some(project)),
            _ => (self.zentao_id.as_str(), None),
        }
    }
}

/// Loads a config file; used by integration tests and local tooling. Hosts
/// normally construct `SyncConfig` themselves.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zentao_id_splits_product_and_project() {
        let config = ZentaoConfig {
            address: "http://zentao.local".into(),
            account: "admin".into(),
            password: "secret".into(),
            zentao_id: "12-7".into(),
        };
        assert_eq!(config.product_project(), ("12", Some("7")));

        let product_only = ZentaoConfig {
            zentao_id: "12".into(),
            ..config
        };
        assert_eq!(product_only.product_project(), ("12", None));
    }

    #[test]
    fn blank_project_key_is_a_config_error() {
        let project = JiraProjectConfig {
            project_key: " ".into(),
            bug_type_id: "10004".into(),
            demand_type_id: None,
        };
        assert!(matches!(project.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn parses_toml_sections() {
        let raw = r#"
            [jira]
            address = "https://jira.example.com"
            mode = "basic"
            account = "bot"
            password = "secret"
            project_key = "PROJ"
            bug_type_id = "10004"

            [tapd]
            address = "https://api.tapd.cn"
            account = "api-user"
            password = "api-token"
            workspace_id = "41000001"
            host_address = "https://ms.example.com"
        "#;
        let config: SyncConfig = toml::from_str(raw).unwrap();
        assert!(config.jira.is_some());
        assert!(config.tapd.is_some());
        assert!(config.zentao.is_none());
        let jira = config.jira.unwrap();
        assert!(matches!(jira.auth, AuthConfig::Basic { .. }));
        assert_eq!(jira.project.project_key, "PROJ");
    }
}
