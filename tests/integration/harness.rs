use org_block_language_server::server::Backend;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tower_lsp_server::jsonrpc::{Id, Request, Response};
use tower_lsp_server::lsp_types::request::{
    ApplyWorkspaceEdit, RegisterCapability, Request as LspRequest, ShowMessageRequest,
    WorkDoneProgressCreate,
};
use tower_lsp_server::{lsp_types::*, UriExt};
use tower_lsp_server::{LspService, Server};

use super::test_logger;

// This file leverages code from:
// https://github.com/veryl-lang/veryl/blob/fdac1dfafff82e1227239b77930700927b091de1/crates/languageserver/src/tests.rs#L15

#[derive(Debug)]
pub enum ServerMessage {
    Response(Response),
    Notification(Request),
    ServerRequest(Request),
}

pub struct TestHarness {
    req_stream: DuplexStream,
    res_stream: DuplexStream,
    read_buffer: Vec<u8>,
    responses: VecDeque<String>,
    unhandled_notifications: VecDeque<Request>,
    request_id: i64,
    /// Replies for `window/showMessageRequest`, consumed in order. `None`
    /// dismisses the prompt.
    message_replies: VecDeque<Option<String>>,
    /// Edits the server asked us to apply via `workspace/applyEdit`.
    applied_edits: Vec<ApplyWorkspaceEditParams>,
    #[allow(dead_code)] // Unused, but keep so the directory isn't cleaned up.
    temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        test_logger::init();
        let (req_client, req_server) = io::duplex(1024);
        let (res_server, res_client) = io::duplex(1024);

        let (service, socket) = LspService::new(Backend::new);

        tokio::spawn(Server::new(req_server, res_server, socket).serve(service));

        let temp_dir = TempDir::new().unwrap();
        let root_path = temp_dir.path().canonicalize().unwrap();

        Self {
            req_stream: req_client,
            res_stream: res_client,
            read_buffer: Vec::new(),
            responses: VecDeque::new(),
            unhandled_notifications: VecDeque::new(),
            request_id: 0,
            message_replies: VecDeque::new(),
            applied_edits: Vec::new(),
            temp_dir,
            root_path,
        }
    }

    pub fn file_uri<P: AsRef<Path>>(&self, path: P) -> Uri {
        Uri::from_file_path(self.root_path.join(path)).unwrap()
    }

    /// Queue the user's reply to the next `window/showMessageRequest`.
    pub fn queue_message_reply(&mut self, title: Option<&str>) {
        self.message_replies.push_back(title.map(String::from));
    }

    pub fn applied_edits(&self) -> &[ApplyWorkspaceEditParams] {
        &self.applied_edits
    }

    fn encode(payload: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload)
    }

    async fn send_request(&mut self, req: Request) {
        let req = serde_json::to_string(&req).unwrap();
        let req = Self::encode(&req);
        self.req_stream.write_all(req.as_bytes()).await.unwrap();
    }

    async fn recv_message(&mut self) -> ServerMessage {
        // Loop until we have successfully parsed at least one message.
        while self.responses.is_empty() {
            if self.fill_buffer().await.is_err() {
                panic!("Failed to read from server");
            }

            // Try to parse messages from our persistent buffer.
            loop {
                let buf_str = String::from_utf8_lossy(&self.read_buffer);
                if let Some(p) = buf_str.find("\r\n\r\n") {
                    let header_end = p + 4;
                    let header = &buf_str[..p];

                    let len_str = header
                        .strip_prefix("Content-Length: ")
                        .expect("Missing Content-Length header");
                    let len: usize = len_str.parse().expect("Invalid Content-Length value");

                    let message_end = header_end + len;

                    // If we don't have the full message yet, wait for more data.
                    if self.read_buffer.len() < message_end {
                        break;
                    }

                    let message_bytes = &self.read_buffer[header_end..message_end];
                    let msg_str = String::from_utf8(message_bytes.to_vec())
                        .expect("Server sent invalid UTF-8");

                    self.responses.push_back(msg_str);
                    self.read_buffer.drain(..message_end);
                } else {
                    break;
                }
            }
        }

        let msg_str = self.responses.pop_front().unwrap();

        // Try to parse it as a Response. This works if an "id" field is present.
        if let Ok(response) = serde_json::from_str::<Response>(&msg_str) {
            return ServerMessage::Response(response);
        }

        if let Ok(request) = serde_json::from_str::<Request>(&msg_str) {
            // A server-to-client request has an ID, but a notification does not.
            if request.id().is_some() {
                return ServerMessage::ServerRequest(request);
            }
            return ServerMessage::Notification(request);
        }

        panic!("Failed to deserialize server message: {}", msg_str);
    }

    fn next_request_id(&mut self) -> i64 {
        self.request_id += 1;
        self.request_id
    }

    /// Write the workspace files, initialize the server with the given
    /// `initializationOptions`, and open every file.
    pub async fn initialize_and_open(
        &mut self,
        initialization_options: Option<serde_json::Value>,
        workspace: &[(&str, &str)],
    ) {
        for (name, content) in workspace {
            let path = self.root_path.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }

        let mut params = InitializeParams {
            initialization_options,
            ..InitializeParams::default()
        };
        #[allow(deprecated)]
        {
            params.root_uri = Some(Uri::from_file_path(self.root_path.clone()).unwrap());
        }

        let id = self.next_request_id();
        let req = Request::build("initialize")
            .params(serde_json::to_value(params).unwrap())
            .id(id)
            .finish();
        self.send_request(req).await;
        let res = match self.recv_message().await {
            ServerMessage::Response(res) => res,
            ServerMessage::ServerRequest(req) | ServerMessage::Notification(req) => {
                panic!(
                    "Received unexpected message while waiting for initialize response: {:?}",
                    req
                );
            }
        };
        assert!(res.is_ok());

        let params = InitializedParams {};
        let req = Request::build("initialized")
            .params(serde_json::to_value(params).unwrap())
            .finish();
        self.send_request(req).await;

        for (name, content) in workspace {
            let uri = Uri::from_file_path(self.root_path.join(name)).unwrap();
            let text_document = TextDocumentItem {
                uri,
                language_id: "org".to_string(),
                version: 1,
                text: content.to_string(),
            };
            let params = DidOpenTextDocumentParams { text_document };
            let req = Request::build("textDocument/didOpen")
                .params(serde_json::to_value(params).unwrap())
                .finish();
            self.send_request(req).await;
        }
    }

    pub async fn call<R: LspRequest>(&mut self, params: R::Params) -> R::Result
    where
        R::Result: DeserializeOwned,
    {
        let id = self.next_request_id();
        let req = Request::build(R::METHOD)
            .params(serde_json::to_value(params).unwrap())
            .id(id)
            .finish();
        self.send_request(req).await;

        loop {
            match self.recv_message().await {
                ServerMessage::Response(res) => {
                    if res.id() == &Id::Number(id) {
                        let value = res.result().expect("Request failed").clone();
                        return serde_json::from_value(value)
                            .expect("Failed to deserialize response result");
                    }
                    panic!(
                        "Received response for unexpected request id. Expected: {:?}, Got: {:?}",
                        id,
                        res.id()
                    );
                }
                ServerMessage::Notification(req) => {
                    // Log messages and the like; keep them out of the way.
                    self.unhandled_notifications.push_back(req);
                }
                ServerMessage::ServerRequest(req) => {
                    self.handle_server_request(req).await;
                }
            }
        }
    }

    async fn fill_buffer(&mut self) -> io::Result<()> {
        if !self.responses.is_empty() {
            return Ok(());
        }

        let mut buf = vec![0; 8192];
        match tokio::time::timeout(
            std::time::Duration::from_secs(5),
            self.res_stream.read(&mut buf),
        )
        .await
        {
            // Server closed the connection.
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "server closed connection",
            )),
            Ok(Ok(n)) => {
                self.read_buffer.extend_from_slice(&buf[..n]);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out waiting for a response",
            )),
        }
    }

    async fn handle_server_request(&mut self, req: Request) {
        let result = match req.method() {
            ShowMessageRequest::METHOD => {
                let reply = self.message_replies.pop_front().flatten();
                match reply {
                    Some(title) => serde_json::json!(MessageActionItem {
                        title,
                        properties: HashMap::new(),
                    }),
                    None => serde_json::json!(null),
                }
            }
            ApplyWorkspaceEdit::METHOD => {
                let params = req.params().expect("applyEdit is missing params").clone();
                let params: ApplyWorkspaceEditParams =
                    serde_json::from_value(params).expect("Failed to parse applyEdit params");
                self.applied_edits.push(params);
                serde_json::json!(ApplyWorkspaceEditResponse {
                    applied: true,
                    failure_reason: None,
                    failed_change: None,
                })
            }
            WorkDoneProgressCreate::METHOD | RegisterCapability::METHOD => {
                serde_json::json!(null)
            }
            _ => {
                panic!("Received unhandled server request: {}", req.method());
            }
        };

        let id = req.id().unwrap().clone();
        let response = Response::from_ok(id, result);
        let response_str = serde_json::to_string(&response).unwrap();
        let encoded_response = Self::encode(&response_str);
        self.req_stream
            .write_all(encoded_response.as_bytes())
            .await
            .unwrap();
    }
}
