//! Performance benchmarks for the match core and replication path

use client::game::PeerGame;
use server::game::HostGame;
use shared::{
    Command, FieldUpdate, MatchConfig, Packet, Participant, ReplicatedState, SessionListener,
    Side,
};
use std::time::Instant;

const DT: f32 = 1.0 / 60.0;

/// Benchmarks the host's fixed tick with a match in progress
#[test]
fn benchmark_host_tick() {
    let mut host = HostGame::new(MatchConfig::default(), false);
    host.join(1);
    host.request(Participant::Host, Command::Start);
    host.tick(DT);

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 120 == 0 {
            host.request(Participant::Host, Command::Serve);
        }
        let _ = host.tick(DT);
    }

    let duration = start.elapsed();
    println!(
        "Host tick: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks flushing committed writes through several listeners
#[test]
fn benchmark_state_flush() {
    struct Counter(u64);
    impl SessionListener for Counter {
        fn on_score_changed(&mut self, _side: Side, score: u32) {
            self.0 += score as u64;
        }
        fn on_timer_changed(&mut self, _remaining_seconds: f32) {
            self.0 += 1;
        }
    }

    let mut state = ReplicatedState::authoritative(300.0);
    for _ in 0..4 {
        state.add_listener(Box::new(Counter(0)));
    }

    let iterations = 10_000u32;
    let start = Instant::now();

    for i in 0..iterations {
        state.commit(FieldUpdate::HostScore(i % 11)).unwrap();
        state.commit(FieldUpdate::ServeCounter(i % 4)).unwrap();
        state
            .commit(FieldUpdate::Timer(300.0 - i as f32 * DT))
            .unwrap();
        state.flush();
        let _ = state.take_outbox();
    }

    let duration = start.elapsed();
    println!(
        "State flush: {} commands in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks network packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    use bincode::{deserialize, serialize};

    let host = HostGame::new(MatchConfig::default(), false);
    let packet = host.snapshot();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a peer mirror consuming a long stream of updates
#[test]
fn benchmark_peer_replication() {
    let updates: Vec<(u32, Vec<FieldUpdate>)> = (1..=10_000u32)
        .map(|sequence| {
            (
                sequence,
                vec![
                    FieldUpdate::Timer(300.0 - sequence as f32 * DT),
                    FieldUpdate::GuestScore(sequence % 11),
                ],
            )
        })
        .collect();

    let mut peer = PeerGame::new();
    let start = Instant::now();

    for (sequence, batch) in &updates {
        peer.apply_update(*sequence, batch);
    }

    let duration = start.elapsed();
    println!(
        "Peer replication: {} updates in {:?}",
        updates.len(),
        duration
    );

    assert_eq!(peer.last_sequence(), Some(10_000));
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Stress tests the command queue with many requests in one tick
#[test]
fn stress_test_command_queue() {
    let mut host = HostGame::new(MatchConfig::default(), false);
    host.join(1);
    host.request(Participant::Host, Command::Start);
    host.tick(DT);

    let commands = 1_000;
    for i in 0..commands {
        let from = if i % 2 == 0 {
            Participant::Host
        } else {
            Participant::Peer(1)
        };
        let command = if i % 2 == 0 {
            Command::Pause
        } else {
            Command::Resume
        };
        host.request(from, command);
    }

    let start = Instant::now();
    let packets = host.tick(DT);
    let duration = start.elapsed();

    println!(
        "Command queue: {} commands in {:?} ({} packets)",
        commands,
        duration,
        packets.len()
    );

    // Every pause and resume is accepted, plus the tick's own timer update
    assert_eq!(packets.len(), commands + 1);
    assert_eq!(host.router().pending(), 0);
    // Should complete in under 500ms
    assert!(duration.as_millis() < 500);
}
