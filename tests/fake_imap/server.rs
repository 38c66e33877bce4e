//! Listener, STARTTLS upgrade and command dispatch.
//!
//! Every connection walks the same path:
//!
//! ```text
//! * OK greeting            (plain TCP)
//! A0 STARTTLS -> A0 OK     (plain TCP)
//! TLS handshake
//! LOGIN, SELECT, UID SEARCH / FETCH / STORE, NOOP, EXPUNGE, LOGOUT
//! ```
//!
//! Commands are parsed with imap-codec. FETCH items are taken from the
//! raw line instead, so section paths such as `BODY.PEEK[2.1]` reach the
//! handler exactly as the client spelled them.

use super::handlers::{
    Reply, capability, expunge, fetch, login, logout, noop, requested_items, search, select,
    store_deleted,
};
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as MailboxName;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::TlsAcceptor;

/// Flag update a real server may push in the middle of any FETCH.
const UNSOLICITED_FLAGS: &[u8] = b"* 1 FETCH (FLAGS (\\Seen))\r\n";

/// State every connection sees.
#[derive(Default)]
struct Shared {
    mailbox: Mutex<Mailbox>,
    connections: AtomicUsize,
    fetches: AtomicUsize,
    refuse_noop: AtomicBool,
    flag_updates: AtomicBool,
}

/// A TLS IMAP server on `127.0.0.1` with an OS-assigned port.
///
/// Dropping it stops the accept loop and closes every open connection.
pub struct FakeImapServer {
    port: u16,
    shared: Arc<Shared>,
    accept: JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let acceptor = tls_acceptor();
        let shared = Arc::new(Shared {
            mailbox: Mutex::new(mailbox),
            ..Shared::default()
        });

        let state = Arc::clone(&shared);
        let accept = tokio::spawn(async move {
            // Owned by this task, so aborting it aborts the connections too.
            let mut open = JoinSet::new();
            while let Ok((tcp, _)) = listener.accept().await {
                state.connections.fetch_add(1, Ordering::SeqCst);
                open.spawn(negotiate(tcp, acceptor.clone(), Arc::clone(&state)));
                while open.try_join_next().is_some() {}
            }
        });

        Self {
            port,
            shared,
            accept,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// UID FETCH commands answered so far, across all connections.
    pub fn fetches(&self) -> usize {
        self.shared.fetches.load(Ordering::SeqCst)
    }

    /// While set, NOOP is answered `NO`.
    pub fn refuse_noop(&self, refuse: bool) {
        self.shared.refuse_noop.store(refuse, Ordering::SeqCst);
    }

    /// While set, every FETCH reply starts with a flag update for
    /// sequence number 1 that carries no UID.
    pub fn push_flag_updates(&self, push: bool) {
        self.shared.flag_updates.store(push, Ordering::SeqCst);
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

/// Self-signed certificate for `127.0.0.1`, generated per server.
fn tls_acceptor() -> TlsAcceptor {
    // Tests race to install the provider; losing the race is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.der().clone()], key.into())
        .expect("build server TLS config");
    TlsAcceptor::from(Arc::new(config))
}

async fn write<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    bytes: &[u8],
) -> std::io::Result<()> {
    stream.get_mut().write_all(bytes).await?;
    stream.get_mut().flush().await
}

/// Greet, wait for STARTTLS, then hand the encrypted stream to [`serve`].
async fn negotiate(tcp: TcpStream, acceptor: TlsAcceptor, shared: Arc<Shared>) {
    let mut plain = BufReader::new(tcp);
    if write(&mut plain, b"* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    let mut line = String::new();
    if plain.read_line(&mut line).await.is_err() {
        return;
    }
    let mut words = line.split_whitespace();
    let tag = words.next().unwrap_or("*").to_string();
    let starttls = words.next().is_some_and(|w| w.eq_ignore_ascii_case("STARTTLS"));

    let reply = if starttls {
        Reply::new().done(&tag, "OK Begin TLS negotiation now")
    } else {
        Reply::new().done(&tag, "BAD Expected STARTTLS")
    };
    if write(&mut plain, &reply).await.is_err() || !starttls {
        return;
    }

    if let Ok(tls) = acceptor.accept(plain.into_inner()).await {
        serve(tls, shared).await;
    }
}

/// Answer commands until LOGOUT or until the client goes away.
async fn serve<S: AsyncRead + AsyncWrite + Unpin>(stream: S, shared: Arc<Shared>) {
    let mut stream = BufReader::new(stream);
    let mut connection = Connection {
        shared,
        selected: None,
    };

    let mut line = String::new();
    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        let (reply, bye) = connection.answer(&line);
        if write(&mut stream, &reply).await.is_err() || bye {
            break;
        }
    }
}

struct Connection {
    shared: Arc<Shared>,
    selected: Option<String>,
}

impl Connection {
    /// Reply bytes for one command line, and whether the client said goodbye.
    fn answer(&mut self, line: &str) -> (Vec<u8>, bool) {
        let Ok((_, command)) = CommandCodec::default().decode(line.as_bytes()) else {
            let tag = line.split_whitespace().next().unwrap_or("*");
            return (Reply::new().done(tag, "BAD Parse error"), false);
        };
        let tag = command.tag.inner();
        let folder = self.selected.clone();
        let folder = folder.as_deref();
        let mut mailbox = self.shared.mailbox.lock().unwrap();

        let reply = match command.body {
            CommandBody::Capability => capability(tag),
            CommandBody::Login { .. } => login(tag),
            CommandBody::Noop => noop(tag, self.shared.refuse_noop.load(Ordering::SeqCst)),
            CommandBody::Select { mailbox: name, .. } => {
                let (reply, selected) = select(tag, &folder_name(&name), &mailbox);
                self.selected = selected;
                reply
            }
            CommandBody::Search {
                criteria,
                uid: true,
                ..
            } => search(tag, criteria.as_ref(), &mailbox, folder),
            CommandBody::Fetch {
                sequence_set,
                uid: true,
                ..
            } => {
                self.shared.fetches.fetch_add(1, Ordering::SeqCst);
                let mut reply = Vec::new();
                if self.shared.flag_updates.load(Ordering::SeqCst) {
                    reply.extend_from_slice(UNSOLICITED_FLAGS);
                }
                reply.extend(fetch(
                    tag,
                    &sequence_set,
                    &requested_items(line),
                    &mailbox,
                    folder,
                ));
                reply
            }
            CommandBody::Store {
                sequence_set,
                kind,
                flags,
                uid: true,
                ..
            } => store_deleted(tag, &sequence_set, &kind, &flags, &mut mailbox, folder),
            CommandBody::Expunge => expunge(tag, &mut mailbox, folder),
            CommandBody::Logout => return (logout(tag), true),
            _ => Reply::new().done(tag, "BAD Unknown command"),
        };
        (reply, false)
    }
}

fn folder_name(name: &MailboxName<'_>) -> String {
    match name {
        MailboxName::Inbox => "INBOX".to_string(),
        MailboxName::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
