//! EXPUNGE: removes messages flagged `\Deleted`. `MailClient::close`
//! sends it before logging out.
//!
//! Each removal is reported with the sequence number the message had at
//! that moment, so the numbers already account for earlier removals.

use super::{Reply, selected_mut};
use crate::fake_imap::mailbox::Mailbox;

pub fn expunge(tag: &str, mailbox: &mut Mailbox, folder: Option<&str>) -> Vec<u8> {
    let folder = match selected_mut(tag, mailbox, folder) {
        Ok(folder) => folder,
        Err(reply) => return reply,
    };

    let mut reply = Reply::new();
    let mut seq = 1;
    folder.emails.retain(|email| {
        if email.deleted {
            reply = std::mem::take(&mut reply).data(&format!("{seq} EXPUNGE"));
            false
        } else {
            seq += 1;
            true
        }
    });
    reply.done(tag, "OK EXPUNGE completed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::text;
    use crate::fake_imap::mailbox::{MailboxBuilder, TestEmail};

    fn email(uid: u32, deleted: bool) -> TestEmail {
        let mut email = TestEmail::new(uid, b"Subject: x\r\n\r\n");
        email.deleted = deleted;
        email
    }

    fn uids(mailbox: &Mailbox) -> Vec<u32> {
        mailbox.get_folder("INBOX").unwrap().emails.iter().map(|e| e.uid).collect()
    }

    #[test]
    fn sequence_numbers_shift_as_messages_go() {
        let mut mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(email(1, true))
            .email(email(2, false))
            .email(email(3, true))
            .email(email(4, true))
            .build();

        let reply = expunge("A7", &mut mailbox, Some("INBOX"));

        assert_eq!(
            text(&reply),
            "* 1 EXPUNGE\r\n* 2 EXPUNGE\r\n* 2 EXPUNGE\r\nA7 OK EXPUNGE completed\r\n"
        );
        assert_eq!(uids(&mailbox), vec![2]);
    }

    #[test]
    fn nothing_flagged_leaves_folder_alone() {
        let mut mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(email(5, false))
            .build();

        let reply = expunge("A7", &mut mailbox, Some("INBOX"));

        assert_eq!(text(&reply), "A7 OK EXPUNGE completed\r\n");
        assert_eq!(uids(&mailbox), vec![5]);
    }
}
