//! Host network layer handling UDP communications and the fixed tick loop

use crate::client_manager::{ClientManager, CLIENT_TIMEOUT};
use crate::config::ServerConfig;
use crate::game::HostGame;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Command, Packet, Participant, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    /// A line typed on the host console
    ConsoleLine { line: String },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, exclude: Option<u32> },
}

/// Main server coordinating networking and the authoritative match
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: HostGame,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let address = config.address();
        let socket = Arc::new(UdpSocket::bind(&address).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            game: HostGame::new(config.game.clone(), config.auto_start),
            tick_duration: config.tick_duration(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Handle for asking the main loop to stop
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Spawns task that forwards host console lines to the main loop
    fn spawn_console_reader(&self) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if server_tx.send(ServerMessage::ConsoleLine { line }).is_err() {
                    break;
                }
            }
            debug!("Console input closed");
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    fn broadcast_all(&self, packets: Vec<Packet>) {
        for packet in packets {
            self.broadcast_packet(packet, None);
        }
    }

    /// Removes a peer and releases its seat
    async fn drop_client(&mut self, client_id: u32) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        let packets = self.game.leave(client_id);
        self.broadcast_all(packets);
    }

    /// Processes an incoming packet from a peer
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.drop_client(existing_id).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                if let Some(client_id) = client_id {
                    let side = self.game.join(client_id);
                    self.send_packet(Packet::Connected { client_id, side }, addr);
                    self.send_packet(self.game.snapshot(), addr);
                } else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(response, addr);
                }
            }

            Packet::Command { command } => {
                if let Some(client_id) = self.touch(addr).await {
                    self.game.request(Participant::Peer(client_id), command);
                }
            }

            Packet::PaddleContact { normal, velocity } => {
                if let Some(client_id) = self.touch(addr).await {
                    let packets = self.game.paddle_contact(
                        Participant::Peer(client_id),
                        normal,
                        velocity,
                    );
                    self.broadcast_all(packets);
                }
            }

            Packet::SyncRequest => {
                if self.touch(addr).await.is_some() {
                    debug!("Snapshot requested by {}", addr);
                    self.send_packet(self.game.snapshot(), addr);
                }
            }

            Packet::Heartbeat => {
                self.touch(addr).await;
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(client_id) = client_id {
                    self.drop_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Refreshes the sender's heartbeat, returning its ID if it is connected
    async fn touch(&self, addr: SocketAddr) -> Option<u32> {
        let client_id = {
            let mut clients = self.clients.write().await;
            clients.touch_addr(addr)
        };
        if client_id.is_none() {
            debug!("Packet from unknown address {}", addr);
        }
        client_id
    }

    /// Handles a line typed on the host console
    fn handle_console_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.eq_ignore_ascii_case("hit") {
            let packets = self.game.swing();
            self.broadcast_all(packets);
            return;
        }
        match line.parse::<Command>() {
            Ok(command) => self.game.request(Participant::Host, command),
            Err(e) => warn!("{}", e),
        }
    }

    /// Advances the match by one fixed tick and broadcasts the result
    async fn tick(&mut self) {
        let dt = self.tick_duration.as_secs_f32();
        let packets = self.game.tick(dt);
        self.broadcast_all(packets);

        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };
        if client_count > 0 {
            self.broadcast_packet(self.game.ball_snapshot(), None);
        }

        let ticks_per_second = (1.0 / dt).round().max(1.0) as u32;
        if self.game.tick % ticks_per_second == 0 && client_count > 0 {
            let state = self.game.session().state();
            debug!(
                "Tick {}: {} clients, {:?}, {:.1}s left",
                self.game.tick,
                client_count,
                state.session_state(),
                state.remaining_time()
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.spawn_console_reader();

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            let packets = self.game.leave(client_id);
                            self.broadcast_all(packets);
                        },
                        Some(ServerMessage::ConsoleLine { line }) => {
                            self.handle_console_line(&line);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick().await;
                },
            }
        }

        self.notify_shutdown().await;
        Ok(())
    }

    /// Tells every connected peer the host is going away. Sent on the
    /// socket directly so it is out before the runtime stops.
    async fn notify_shutdown(&self) {
        let packet = Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        };
        let client_addrs = self.clients.read().await.get_client_addrs();
        for (client_id, addr) in client_addrs {
            if let Err(e) = Self::send_packet_impl(&self.socket, &packet, addr).await {
                error!("Failed to notify client {} of shutdown: {}", client_id, e);
            }
        }
    }
}
