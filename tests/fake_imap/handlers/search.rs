//! UID SEARCH over the flag keys a reader sends: `ALL`, `SEEN`,
//! `UNSEEN`, `DELETED`, `UNDELETED`, combined with `NOT`, `OR` and
//! implicit AND. Other keys match everything.

use super::{Reply, selected};
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::search::SearchKey;

pub fn search(
    tag: &str,
    criteria: &[SearchKey<'_>],
    mailbox: &Mailbox,
    folder: Option<&str>,
) -> Vec<u8> {
    let folder = match selected(tag, mailbox, folder) {
        Ok(folder) => folder,
        Err(reply) => return reply,
    };

    let hits: Vec<String> = folder
        .emails
        .iter()
        .filter(|email| criteria.iter().all(|key| matches(email, key)))
        .map(|email| email.uid.to_string())
        .collect();

    // "* SEARCH" with nothing after it when no message matches.
    let line = if hits.is_empty() {
        "SEARCH".to_string()
    } else {
        format!("SEARCH {}", hits.join(" "))
    };
    Reply::new().data(&line).done(tag, "OK SEARCH completed")
}

fn matches(email: &TestEmail, key: &SearchKey<'_>) -> bool {
    match key {
        SearchKey::Seen => email.seen,
        SearchKey::Unseen => !email.seen,
        SearchKey::Deleted => email.deleted,
        SearchKey::Undeleted => !email.deleted,
        SearchKey::Not(inner) => !matches(email, inner),
        SearchKey::Or(a, b) => matches(email, a) || matches(email, b),
        SearchKey::And(keys) => keys.as_ref().iter().all(|k| matches(email, k)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::text;
    use crate::fake_imap::mailbox::MailboxBuilder;

    fn mailbox() -> Mailbox {
        let mut trashed = TestEmail::new(2, b"Subject: b\r\n\r\n");
        trashed.deleted = true;
        MailboxBuilder::new()
            .folder("INBOX")
            .email(TestEmail::new(1, b"Subject: a\r\n\r\n"))
            .email(trashed)
            .email(TestEmail::new(3, b"Subject: c\r\n\r\n").seen(true))
            .build()
    }

    #[test]
    fn default_reader_query_skips_seen_and_deleted() {
        let reply = search(
            "A3",
            &[SearchKey::Unseen, SearchKey::Undeleted],
            &mailbox(),
            Some("INBOX"),
        );
        assert_eq!(text(&reply), "* SEARCH 1\r\nA3 OK SEARCH completed\r\n");
    }

    #[test]
    fn all_lists_every_uid_in_order() {
        let reply = search("A3", &[SearchKey::All], &mailbox(), Some("INBOX"));
        assert!(text(&reply).starts_with("* SEARCH 1 2 3\r\n"));
    }

    #[test]
    fn negation_and_alternatives() {
        let seen_or_deleted = SearchKey::Or(
            Box::new(SearchKey::Seen),
            Box::new(SearchKey::Deleted),
        );
        let reply = search("A3", &[seen_or_deleted], &mailbox(), Some("INBOX"));
        assert!(text(&reply).starts_with("* SEARCH 2 3\r\n"));

        let not_seen = SearchKey::Not(Box::new(SearchKey::Seen));
        let reply = search("A3", &[not_seen], &mailbox(), Some("INBOX"));
        assert!(text(&reply).starts_with("* SEARCH 1 2\r\n"));
    }

    #[test]
    fn no_hits_is_a_bare_search_line() {
        let empty = MailboxBuilder::new().folder("INBOX").build();
        let reply = search("A3", &[SearchKey::All], &empty, Some("INBOX"));
        assert_eq!(text(&reply), "* SEARCH\r\nA3 OK SEARCH completed\r\n");
    }

    #[test]
    fn needs_a_selected_folder() {
        let reply = search("A3", &[SearchKey::All], &mailbox(), None);
        assert_eq!(text(&reply), "A3 BAD No folder selected\r\n");
    }
}
