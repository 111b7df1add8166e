use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

use crate::{
    error::GameError,
    models::{chat::ChatMessage, room::ActionKey, room::Room},
    services::{
        game_service::{self, ActionReceipt},
        phase_machine::PhaseMachine,
        room_service,
    },
    state::AppState,
    store::RoomStore,
};

/// Commands a connected participant may send, one JSON object per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Vote {
        target_id: String,
    },
    Action {
        action: ActionKey,
        target_id: String,
    },
    Chat {
        text: String,
    },
    Ready {
        #[serde(default = "default_ready")]
        ready: bool,
    },
    Start,
    /// Host only, once the countdown has run out.
    Advance,
    Leave,
}

fn default_ready() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The room as this participant is allowed to see it.
    Room { room: Room },
    Chat { message: ChatMessage },
    Receipt { receipt: ActionReceipt },
    Ack,
    Error { message: String },
    Closed,
}

impl ServerEvent {
    fn into_message(self) -> Option<Message> {
        match serde_json::to_string(&self) {
            Ok(text) => Some(Message::Text(text)),
            Err(e) => {
                warn!("could not encode websocket event: {}", e);
                None
            }
        }
    }
}

pub async fn handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(session): Query<SessionQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, session.player_id))
}

pub async fn handle_socket(ws: WebSocket, state: AppState, room_id: String, player_id: String) {
    let (mut sender, mut receiver) = ws.split();

    let joined = match state.store.get_room(&room_id).await {
        Ok(room) if room.is_member(&player_id) => true,
        Ok(_) => false,
        Err(e) => {
            debug!("websocket for unknown room {}: {}", room_id, e);
            false
        }
    };
    if !joined {
        let refusal = ServerEvent::Error {
            message: GameError::NotInRoom(player_id.clone()).to_string(),
        };
        if let Some(msg) = refusal.into_message() {
            let _ = sender.send(msg).await;
        }
        let _ = sender.close().await;
        return;
    }

    let (mut rooms, mut chat) = match subscribe(state.store.as_ref(), &room_id).await {
        Ok(feeds) => feeds,
        Err(e) => {
            warn!("could not subscribe to room {}: {}", room_id, e);
            return;
        }
    };
    info!("{} connected to room {}", player_id, room_id);

    state
        .syncs
        .attach(state.store.clone(), &room_id, &player_id)
        .await;
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerEvent>(32);

    let viewer = player_id.clone();
    let mut send_task = tokio::spawn(async move {
        let initial = rooms.borrow_and_update().clone();
        let mut latest = match initial {
            Some(room) => room,
            None => return,
        };
        if let Some(msg) = (ServerEvent::Room {
            room: latest.view_for(&viewer),
        })
        .into_message()
        {
            if sender.send(msg).await.is_err() {
                return;
            }
        }

        loop {
            let event = tokio::select! {
                changed = rooms.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = rooms.borrow_and_update().clone();
                    match snapshot {
                        Some(room) => {
                            latest = room;
                            ServerEvent::Room { room: latest.view_for(&viewer) }
                        }
                        None => ServerEvent::Closed,
                    }
                }
                received = chat.recv() => match received {
                    Ok(message) if room_service::can_read(&latest, &viewer, &message) => {
                        ServerEvent::Chat { message }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("{} skipped {} chat messages", viewer, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(event) => event,
                    None => break,
                },
            };

            let closing = event == ServerEvent::Closed;
            if let Some(msg) = event.into_message() {
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
            if closing {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let store = state.store.clone();
    let (actor, room) = (player_id.clone(), room_id.clone());
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let reply = match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => dispatch(store.as_ref(), &room, &actor, command)
                    .await
                    .unwrap_or_else(|e| ServerEvent::Error {
                        message: e.to_string(),
                    }),
                Err(e) => ServerEvent::Error {
                    message: format!("malformed command: {}", e),
                },
            };
            // A `Closed` reply ends the session from the sending side.
            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }
    state.syncs.detach(&room_id, &player_id).await;
    info!("{} disconnected from room {}", player_id, room_id);
}

async fn subscribe(
    store: &dyn RoomStore,
    room_id: &str,
) -> Result<
    (
        tokio::sync::watch::Receiver<Option<Room>>,
        tokio::sync::broadcast::Receiver<ChatMessage>,
    ),
    GameError,
> {
    let rooms = store.watch_room(room_id).await?;
    let chat = store.subscribe_messages(room_id).await?;
    Ok((rooms, chat))
}

/// Runs one participant command against the store.
pub async fn dispatch(
    store: &dyn RoomStore,
    room_id: &str,
    player_id: &str,
    command: ClientCommand,
) -> Result<ServerEvent, GameError> {
    match command {
        ClientCommand::Vote { target_id } => {
            game_service::submit_vote(store, room_id, player_id, &target_id).await?;
            Ok(ServerEvent::Ack)
        }
        ClientCommand::Action { action, target_id } => {
            let receipt =
                game_service::submit_action(store, room_id, player_id, action, &target_id).await?;
            Ok(ServerEvent::Receipt { receipt })
        }
        ClientCommand::Chat { text } => {
            room_service::send_message(store, room_id, player_id, &text).await?;
            Ok(ServerEvent::Ack)
        }
        ClientCommand::Ready { ready } => {
            room_service::set_ready(store, room_id, player_id, ready).await?;
            Ok(ServerEvent::Ack)
        }
        ClientCommand::Start => {
            game_service::start_game(store, room_id, player_id).await?;
            Ok(ServerEvent::Ack)
        }
        ClientCommand::Advance => {
            let machine = PhaseMachine::new(store.load_config().await?);
            game_service::advance_phase(store, room_id, player_id, &machine).await?;
            Ok(ServerEvent::Ack)
        }
        ClientCommand::Leave => {
            room_service::leave_room(store, room_id, player_id).await?;
            Ok(ServerEvent::Closed)
        }
    }
}
