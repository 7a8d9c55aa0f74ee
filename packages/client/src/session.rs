//! WebSocket client session management.

use futures_util::{Sink, SinkExt, StreamExt};
use kakehashi_server::{
    domain::Role,
    infrastructure::dto::websocket::{ClientEvent, ServerEvent},
};
use kakehashi_shared::time::get_unix_millis;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::{
    domain::{HELP_TEXT, InputAction, parse_input_line},
    error::ClientError,
    formatter::EventFormatter,
    ui::redisplay_prompt,
};

/// How a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user closed the prompt
    UserExit,
}

/// Connection parameters of one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub role: Role,
    pub token: Option<String>,
}

impl SessionConfig {
    /// Relay URL with the handshake query appended, percent-encoded.
    pub fn handshake_url(&self) -> Result<Url, ClientError> {
        let mut url =
            Url::parse(&self.url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("role", &self.role.to_string());
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.role)
    }
}

/// Run one connection until the user exits or the connection fails.
pub async fn run_client_session(
    config: &SessionConfig,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<SessionEnd, ClientError> {
    let url = config.handshake_url()?;
    let (ws_stream, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    tracing::info!("Connected to relay as {}", config.role);
    println!(
        "\nYou are the {}. Type /help for commands. Press Ctrl+C to exit.\n",
        config.role
    );

    let prompt = config.prompt();
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::UserExit);
                };
                match parse_input_line(config.role, &line) {
                    InputAction::Send(event) => send_event(&mut write, &event).await?,
                    InputAction::Help => println!("{}", HELP_TEXT),
                    InputAction::Invalid(reason) => println!("{}", reason),
                }
                redisplay_prompt(&prompt);
            }
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                let rendered =
                                    EventFormatter::format_event(&event, get_unix_millis());
                                print!("{}", rendered);
                                redisplay_prompt(&prompt);
                                if let ServerEvent::AuthResult(result) = &event
                                    && !result.success
                                {
                                    return Err(ClientError::AuthRejected(
                                        result.message.clone().unwrap_or_default(),
                                    ));
                                }
                            }
                            Err(_) => {
                                print!("{}", EventFormatter::format_raw_message(&text));
                                redisplay_prompt(&prompt);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Relay closed the connection");
                        return Err(ClientError::ConnectionError("Connection closed".to_string()));
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        return Err(ClientError::ConnectionError(e.to_string()));
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn send_event<S>(write: &mut S, event: &ClientEvent) -> Result<(), ClientError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize event: {}", e);
            return Ok(());
        }
    };
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_url_carries_role_and_token() {
        // テスト項目: ハンドシェイク URL にロールとトークンが付与される
        // given (前提条件):
        let config = SessionConfig {
            url: "ws://127.0.0.1:3001/ws".to_string(),
            role: Role::Host,
            token: Some("s3cret".to_string()),
        };

        // when (操作):
        let url = config.handshake_url().unwrap();

        // then (期待する結果):
        assert_eq!(url.as_str(), "ws://127.0.0.1:3001/ws?role=host&token=s3cret");
    }

    #[test]
    fn test_handshake_url_without_token() {
        // テスト項目: トークン未指定ならロールだけが付与される
        // given (前提条件):
        let config = SessionConfig {
            url: "ws://127.0.0.1:3001/ws".to_string(),
            role: Role::Viewer,
            token: None,
        };

        // when (操作):
        let url = config.handshake_url().unwrap();

        // then (期待する結果):
        assert_eq!(url.as_str(), "ws://127.0.0.1:3001/ws?role=viewer");
        assert_eq!(config.prompt(), "viewer> ");
    }

    #[test]
    fn test_handshake_url_encodes_reserved_characters_in_token() {
        // テスト項目: 予約文字を含むトークンはエンコードされ、サーバー側で元の値に戻る
        // given (前提条件):
        let token = "a+b&c #%";
        let config = SessionConfig {
            url: "ws://127.0.0.1:3001/ws".to_string(),
            role: Role::Viewer,
            token: Some(token.to_string()),
        };

        // when (操作):
        let url = config.handshake_url().unwrap();

        // then (期待する結果):
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("role".to_string(), "viewer".to_string()),
                ("token".to_string(), token.to_string()),
            ]
        );
        assert!(url.as_str().contains("token=a%2Bb%26c+%23%25"));
    }

    #[test]
    fn test_handshake_url_rejects_unparseable_url() {
        // テスト項目: 解釈できない URL は InvalidUrl になる
        // given (前提条件):
        let config = SessionConfig {
            url: "not a url".to_string(),
            role: Role::Viewer,
            token: None,
        };

        // when (操作):
        let result = config.handshake_url();

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }
}
