use crate::embeddings::CharacterNgramEmbedder;
use crate::error::RemoteError;
use crate::models::Credential;
use crate::traits::{ChatModel, Embedder, ModelProvider, TokenStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Writes a PDF with one page per entry, each holding a single line of text.
pub(crate) fn write_text_pdf(path: &Path, pages: &[&str]) -> Result<(), Box<dyn Error>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

type Script = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Chat model whose reply is computed from the prompt by a closure.
pub(crate) struct ScriptedChatModel {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChatModel {
    pub(crate) fn new(script: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub(crate) fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(message.clone()))
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run(&self, prompt: &str) -> Result<String, RemoteError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        (self.script)(prompt).map_err(RemoteError::Request)
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        self.run(prompt)
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, RemoteError> {
        let reply = self.run(prompt)?;
        let fragments: Vec<Result<String, RemoteError>> = reply
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}

/// Local embeddings plus a shared scripted chat model.
pub(crate) struct ScriptedProvider {
    model: Arc<ScriptedChatModel>,
    embedders: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(model: ScriptedChatModel) -> Self {
        Self {
            model: Arc::new(model),
            embedders: AtomicUsize::new(0),
        }
    }

    pub(crate) fn model(&self) -> &ScriptedChatModel {
        &self.model
    }

    pub(crate) fn embedders_created(&self) -> usize {
        self.embedders.load(Ordering::SeqCst)
    }
}

impl ModelProvider for ScriptedProvider {
    fn embedder(&self, _credential: &Credential) -> Arc<dyn Embedder> {
        self.embedders.fetch_add(1, Ordering::SeqCst);
        Arc::new(CharacterNgramEmbedder::default())
    }

    fn chat_model(&self, _credential: &Credential) -> Arc<dyn ChatModel> {
        self.model.clone()
    }
}

/// Accepts one HTTP connection on 127.0.0.1, replies with a canned response
/// and hands back the raw request text.
pub(crate) struct LoopbackServer {
    addr: SocketAddr,
    handle: JoinHandle<std::io::Result<String>>,
}

impl LoopbackServer {
    pub(crate) async fn respond_once(
        status: &str,
        content_type: &str,
        body: &str,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await?;
            let request = read_request(&mut socket).await?;
            socket.write_all(response.as_bytes()).await?;
            socket.shutdown().await?;
            Ok::<_, std::io::Error>(request)
        });

        Ok(Self { addr, handle })
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub(crate) async fn request(self) -> Result<String, Box<dyn Error>> {
        Ok(self.handle.await??)
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let read = socket.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        received.extend_from_slice(&buf[..read]);

        let Some(header_end) = find(&received, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&received[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if received.len() >= header_end + 4 + content_length {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&received).to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
