//! Attachment reconciliation: computes which remote attachments became
//! orphans after a rich-text edit.

use std::collections::HashSet;

use crate::files::LocalFile;

/// Name prefix given to images the transcoder stages for upload. Only
/// attachments carrying this prefix were ever created by rich-text sync and
/// only they are eligible for automatic deletion.
pub const RICH_IMAGE_PREFIX: &str = "image";

/// One attachment as reported by the tracker.
#[derive(Debug, Clone)]
pub struct RemoteAttachment {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Upload and delete instructions for one update call. Computed fresh per
/// update; trackers mutate their attachment list out of band, so nothing
/// here is ever cached.
#[derive(Debug, Default)]
pub struct AttachmentDelta {
    pub to_upload: Vec<LocalFile>,
    pub to_delete: Vec<String>,
    pub keep: HashSet<String>,
}

/// Schedules deletion for every rich-text image attachment the edited
/// markup no longer references. Attachments uploaded by other means are
/// never touched.
pub fn reconcile(
    remote_attachments: &[RemoteAttachment],
    remain_after_edit: &HashSet<String>,
    to_upload: Vec<LocalFile>,
) -> AttachmentDelta {
    let mut delta = AttachmentDelta {
        to_upload,
        ..AttachmentDelta::default()
    };
    for attachment in remote_attachments {
        if !is_rich_image(attachment) || remain_after_edit.contains(&attachment.file_name) {
            delta.keep.insert(attachment.file_name.clone());
        } else {
            delta.to_delete.push(attachment.id.clone());
        }
    }
    delta
}

fn is_rich_image(attachment: &RemoteAttachment) -> bool {
    attachment.mime_type.starts_with("image/")
        && attachment.file_name.starts_with(RICH_IMAGE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, name: &str, mime: &str) -> RemoteAttachment {
        RemoteAttachment {
            id: id.into(),
            file_name: name.into(),
            mime_type: mime.into(),
        }
    }

    #[test]
    fn orphaned_rich_images_are_deleted() {
        let attachments = vec![
            remote("a1", "image-f1-10.jpg", "image/jpeg"),
            remote("a2", "image-f2-11.jpg", "image/jpeg"),
        ];
        let remain = HashSet::from(["image-f1-10.jpg".to_string()]);
        let delta = reconcile(&attachments, &remain, Vec::new());
        assert_eq!(delta.to_delete, vec!["a2"]);
        assert!(delta.keep.contains("image-f1-10.jpg"));
    }

    #[test]
    fn user_uploads_are_never_auto_deleted() {
        let attachments = vec![
            remote("a1", "design.pdf", "application/pdf"),
            remote("a2", "screenshot.png", "image/png"),
            remote("a3", "image-f9-12.jpg", "text/plain"),
        ];
        let delta = reconcile(&attachments, &HashSet::new(), Vec::new());
        assert!(delta.to_delete.is_empty());
        assert_eq!(delta.keep.len(), 3);
    }
}
