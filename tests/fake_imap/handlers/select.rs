//! SELECT: opens a folder. The client reads `EXISTS` as the message
//! count, which is all `MailClient::count` needs.

use super::Reply;
use crate::fake_imap::mailbox::Mailbox;

/// Returns the reply and, when the folder exists, its name.
pub fn select(tag: &str, name: &str, mailbox: &Mailbox) -> (Vec<u8>, Option<String>) {
    let Some(folder) = mailbox.get_folder(name) else {
        return (Reply::new().done(tag, "NO Folder not found"), None);
    };

    let reply = Reply::new()
        .data("FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)")
        .data(&format!("{} EXISTS", folder.emails.len()))
        .data("OK [UIDVALIDITY 1]")
        .done(tag, "OK [READ-WRITE] SELECT completed");
    (reply, Some(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::text;
    use crate::fake_imap::mailbox::{MailboxBuilder, TestEmail};

    #[test]
    fn reports_message_count() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(TestEmail::new(4, b"Subject: a\r\n\r\n"))
            .email(TestEmail::new(9, b"Subject: b\r\n\r\n").seen(true))
            .build();

        let (reply, selected) = select("A2", "INBOX", &mailbox);

        assert_eq!(selected.as_deref(), Some("INBOX"));
        let reply = text(&reply);
        assert!(reply.contains("* 2 EXISTS\r\n"));
        assert!(reply.ends_with("A2 OK [READ-WRITE] SELECT completed\r\n"));
    }

    #[test]
    fn unknown_folder_is_refused() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let (reply, selected) = select("A2", "Archive", &mailbox);

        assert!(selected.is_none());
        assert_eq!(text(&reply), "A2 NO Folder not found\r\n");
    }
}
