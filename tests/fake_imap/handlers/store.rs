//! UID STORE, limited to what deleting a message sends:
//!
//! ```text
//! A5 UID STORE 7 +FLAGS (\Deleted)
//! * 1 FETCH (UID 7 FLAGS (\Deleted))
//! A5 OK STORE completed
//! ```
//!
//! Any other store form is answered `BAD`.

use super::{Reply, selected_mut};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::flag::{Flag, StoreType};
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};

/// Set `\Deleted` on every listed UID.
pub fn store_deleted(
    tag: &str,
    uids: &SequenceSet,
    kind: &StoreType,
    flags: &[Flag<'_>],
    mailbox: &mut Mailbox,
    folder: Option<&str>,
) -> Vec<u8> {
    let folder = match selected_mut(tag, mailbox, folder) {
        Ok(folder) => folder,
        Err(reply) => return reply,
    };
    if !matches!(kind, StoreType::Add) || !matches!(flags, [Flag::Deleted]) {
        return Reply::new().done(tag, "BAD Only +FLAGS (\\Deleted) is supported");
    }

    let mut reply = Reply::new();
    for uid in uids.0.as_ref().iter().filter_map(single_uid) {
        if let Some(seq) = folder.emails.iter().position(|e| e.uid == uid) {
            let email = &mut folder.emails[seq];
            email.deleted = true;
            reply = reply.data(&format!(
                "{} FETCH (UID {uid} FLAGS ({}))",
                seq + 1,
                email.flag_list()
            ));
        }
    }
    reply.done(tag, "OK STORE completed")
}

fn single_uid(seq: &Sequence) -> Option<u32> {
    match seq {
        Sequence::Single(SeqOrUid::Value(v)) => Some(v.get()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::text;
    use crate::fake_imap::mailbox::{MailboxBuilder, TestEmail};
    use std::num::NonZeroU32;

    fn uid_set(uid: u32) -> SequenceSet {
        SequenceSet(
            vec![Sequence::Single(SeqOrUid::Value(
                NonZeroU32::new(uid).unwrap(),
            ))]
            .try_into()
            .unwrap(),
        )
    }

    fn inbox() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(TestEmail::new(3, b"Subject: keep\r\n\r\n").seen(true))
            .email(TestEmail::new(7, b"Subject: drop\r\n\r\n").seen(true))
            .build()
    }

    #[test]
    fn marks_message_deleted() {
        let mut mailbox = inbox();

        let reply = store_deleted(
            "A5",
            &uid_set(7),
            &StoreType::Add,
            &[Flag::Deleted],
            &mut mailbox,
            Some("INBOX"),
        );

        assert_eq!(
            text(&reply),
            "* 2 FETCH (UID 7 FLAGS (\\Seen \\Deleted))\r\nA5 OK STORE completed\r\n"
        );
        let emails = &mailbox.get_folder("INBOX").unwrap().emails;
        assert!(!emails[0].deleted);
        assert!(emails[1].deleted);
    }

    #[test]
    fn other_store_forms_are_rejected() {
        let mut mailbox = inbox();

        let reply = store_deleted(
            "A5",
            &uid_set(7),
            &StoreType::Remove,
            &[Flag::Seen],
            &mut mailbox,
            Some("INBOX"),
        );

        assert!(text(&reply).starts_with("A5 BAD"));
        assert!(mailbox.get_folder("INBOX").unwrap().emails[1].seen);
    }

    #[test]
    fn needs_a_selected_folder() {
        let mut mailbox = inbox();

        let reply = store_deleted(
            "A5",
            &uid_set(7),
            &StoreType::Add,
            &[Flag::Deleted],
            &mut mailbox,
            None,
        );

        assert_eq!(text(&reply), "A5 BAD No folder selected\r\n");
    }
}
