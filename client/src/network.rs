use crate::game::{Delivery, PeerGame};
use crate::input::{ConsoleInput, InputManager};
use crate::scoreboard::{ConsoleScoreboard, ScoreboardView};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,

    game: PeerGame,
    input_manager: InputManager,
    scoreboard: Arc<Mutex<ScoreboardView>>,

    fake_ping_ms: u64,
    heartbeat: Duration,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        heartbeat_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let scoreboard = ConsoleScoreboard::stdout();
        Self::with_scoreboard(server_addr, fake_ping_ms, heartbeat_ms, scoreboard).await
    }

    pub async fn with_scoreboard(
        server_addr: &str,
        fake_ping_ms: u64,
        heartbeat_ms: u64,
        scoreboard: ConsoleScoreboard,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr = server_addr.parse()?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        let view = scoreboard.view();
        let game = PeerGame::with_presentation(Some(Box::new(scoreboard)));

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            game,
            input_manager: InputManager::new(),
            scoreboard: view,
            fake_ping_ms,
            heartbeat: Duration::from_millis(heartbeat_ms.max(1)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game(&self) -> &PeerGame {
        &self.game
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn scoreboard(&self) -> ScoreboardView {
        *self.scoreboard.lock()
    }

    pub async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_or_log(&self, packet: &Packet) {
        if let Err(e) = self.send_packet(packet).await {
            error!("Error sending packet: {}", e);
        }
    }

    /// Applies one packet from the host. Returns `false` once the host has
    /// closed the connection.
    pub async fn handle_packet(&mut self, packet: Packet, receive_time: Instant) -> bool {
        match packet {
            Packet::Connected { client_id, side } => {
                info!("Connected! Client ID: {}", client_id);
                self.connected = true;
                self.game.set_seat(client_id, side);
            }

            Packet::StateUpdate { sequence, updates } => {
                if self.game.apply_update(sequence, &updates) == Delivery::Gap {
                    self.send_or_log(&Packet::SyncRequest).await;
                }
            }

            Packet::StateSnapshot { sequence, updates } => {
                if self.game.apply_snapshot(sequence, &updates) {
                    debug!("Synchronised at update {}", sequence);
                }
            }

            Packet::BallSnapshot {
                tick,
                state,
                position,
                velocity,
            } => {
                self.game
                    .record_ball(tick, state, position, velocity, receive_time);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                return false;
            }

            other => {
                warn!("Unexpected packet from host: {:?}", other);
            }
        }
        true
    }

    /// Acts on one console input. Returns `false` when the player quits.
    pub async fn handle_input(&mut self, input: ConsoleInput) -> bool {
        match input {
            ConsoleInput::Command(command) => {
                self.send_or_log(&Packet::Command { command }).await;
            }
            ConsoleInput::Hit => match self.game.hit(Instant::now()) {
                Some(packet) => self.send_or_log(&packet).await,
                None => info!("Watching only, there is no paddle to swing"),
            },
            ConsoleInput::Sync => {
                self.send_or_log(&Packet::SyncRequest).await;
            }
            ConsoleInput::Quit => return false,
        }
        true
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut heartbeat_interval = interval(self.heartbeat);
        let mut buffer = [0u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    let receive_time = Instant::now();
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet, receive_time).await {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Dropping malformed packet: {}", e),
                            }
                        },
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = line_rx.recv() => {
                    let Some(line) = line else {
                        info!("Console closed");
                        break;
                    };
                    match self.input_manager.parse(&line) {
                        Ok(Some(input)) => {
                            if !self.handle_input(input).await {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("{}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        self.send_or_log(&Packet::Heartbeat).await;
                        if self.game.awaiting_snapshot() {
                            self.send_or_log(&Packet::SyncRequest).await;
                        }
                    } else if let Err(e) = self.connect().await {
                        error!("Error reconnecting: {}", e);
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        info!("Final score: {}", self.scoreboard().status_line());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Command, FieldUpdate, SessionState, Side};

    async fn client_with_host() -> (Client, UdpSocket) {
        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = host.local_addr().unwrap().to_string();
        let scoreboard = ConsoleScoreboard::new(Box::new(std::io::sink()));
        let client = Client::with_scoreboard(&addr, 0, 1000, scoreboard)
            .await
            .unwrap();
        (client, host)
    }

    async fn recv_packet(host: &UdpSocket) -> Packet {
        let mut buffer = [0u8; 2048];
        let (len, _) = host.recv_from(&mut buffer).await.unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_server_address() {
        let result = Client::new("not an address", 0, 1000).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_sends_protocol_version() {
        let (mut client, host) = client_with_host().await;
        client.connect().await.unwrap();

        assert_eq!(
            recv_packet(&host).await,
            Packet::Connect {
                client_version: PROTOCOL_VERSION
            }
        );
    }

    #[tokio::test]
    async fn test_connected_assigns_seat() {
        let (mut client, _host) = client_with_host().await;
        let open = client
            .handle_packet(
                Packet::Connected {
                    client_id: 3,
                    side: Some(Side::Guest),
                },
                Instant::now(),
            )
            .await;

        assert!(open);
        assert!(client.is_connected());
        assert_eq!(client.game().side(), Some(Side::Guest));
    }

    #[tokio::test]
    async fn test_gap_triggers_sync_request() {
        let (mut client, host) = client_with_host().await;
        let now = Instant::now();
        client
            .handle_packet(
                Packet::StateUpdate {
                    sequence: 1,
                    updates: vec![FieldUpdate::Session(SessionState::Active)],
                },
                now,
            )
            .await;
        client
            .handle_packet(
                Packet::StateUpdate {
                    sequence: 3,
                    updates: vec![FieldUpdate::HostScore(1)],
                },
                now,
            )
            .await;

        assert_eq!(recv_packet(&host).await, Packet::SyncRequest);
        assert_eq!(client.scoreboard().host_score, 0);
        assert_eq!(client.scoreboard().session, SessionState::Active);
        assert!(client.game().awaiting_snapshot());
    }

    #[tokio::test]
    async fn test_command_input_forwarded() {
        let (mut client, host) = client_with_host().await;
        assert!(client.handle_input(ConsoleInput::Command(Command::Pause)).await);

        assert_eq!(
            recv_packet(&host).await,
            Packet::Command {
                command: Command::Pause
            }
        );
        assert!(!client.handle_input(ConsoleInput::Quit).await);
    }

    #[tokio::test]
    async fn test_disconnected_closes_connection() {
        let (mut client, _host) = client_with_host().await;
        let open = client
            .handle_packet(
                Packet::Disconnected {
                    reason: "Server shutting down".to_string(),
                },
                Instant::now(),
            )
            .await;
        assert!(!open);
        assert!(!client.is_connected());
    }
}
