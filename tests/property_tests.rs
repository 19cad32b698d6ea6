//! Property-based tests for meshlink
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Stream Framing Properties
// ============================================================================

mod framing_properties {
    use super::*;
    use meshlink_transport::framing::START1;
    use meshlink_transport::{MAX_FRAME_PAYLOAD, StreamFramer, encode_frame};

    fn noise() -> impl Strategy<Value = Vec<u8>> {
        // Debug output never contains the header start byte
        prop::collection::vec(any::<u8>().prop_filter("header byte", |b| *b != START1), 0..40)
    }

    proptest! {
        /// Frames survive arbitrary chunking and interleaved debug output
        #[test]
        fn frames_survive_chunking_and_noise(
            payloads in prop::collection::vec(
                prop::collection::vec(any::<u8>(), 1..=MAX_FRAME_PAYLOAD),
                1..6,
            ),
            noise_runs in prop::collection::vec(noise(), 6),
            chunk in 1usize..97,
        ) {
            let mut stream = Vec::new();
            for (payload, junk) in payloads.iter().zip(&noise_runs) {
                stream.extend_from_slice(junk);
                stream.extend(encode_frame(payload).unwrap());
            }

            let mut framer = StreamFramer::new();
            let mut decoded = Vec::new();
            for piece in stream.chunks(chunk) {
                decoded.extend(framer.decode(piece));
            }

            prop_assert_eq!(decoded, payloads);
            prop_assert_eq!(framer.buffered(), 0);
        }

        /// The decoder never panics or yields oversize frames on random bytes
        #[test]
        fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
            let mut framer = StreamFramer::new();
            for frame in framer.decode(&bytes) {
                prop_assert!(!frame.is_empty());
                prop_assert!(frame.len() <= MAX_FRAME_PAYLOAD);
            }
        }

        /// Oversize payloads are refused rather than truncated
        #[test]
        fn oversize_payload_rejected(extra in 1usize..512) {
            let payload = vec![0u8; MAX_FRAME_PAYLOAD + extra];
            prop_assert!(encode_frame(&payload).is_err());
        }
    }
}

// ============================================================================
// Correlator Properties
// ============================================================================

mod correlator_properties {
    use super::*;
    use meshlink_core::{Correlator, MatchOutcome, ResponseKind};
    use meshlink_proto::{Data, MeshPacket, PortNum, mesh_packet};
    use std::sync::Arc;
    use std::time::Duration;

    fn reply(from: u32, request_id: u32) -> MeshPacket {
        MeshPacket {
            from,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                portnum: PortNum::AdminApp as i32,
                request_id,
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    proptest! {
        /// However many replies arrive, at most one completes the waiter and
        /// it is the first one from the expected node
        #[test]
        fn at_most_once_resolution(
            id in 1u32..,
            expected in 1u32..8,
            sources in prop::collection::vec(1u32..8, 1..20),
        ) {
            let correlator = Arc::new(Correlator::new());
            let pending = correlator
                .register(id, Some(expected), ResponseKind::Response, Duration::from_secs(60), "prop")
                .unwrap();

            let outcomes: Vec<MatchOutcome> = sources
                .iter()
                .map(|&from| correlator.handle_packet(&reply(from, id)))
                .collect();

            let matched = outcomes.iter().filter(|o| **o == MatchOutcome::Matched).count();
            let first_expected = sources.iter().position(|&from| from == expected);
            match first_expected {
                Some(index) => {
                    prop_assert_eq!(matched, 1);
                    prop_assert_eq!(outcomes[index], MatchOutcome::Matched);
                    prop_assert!(outcomes[..index].iter().all(|o| *o == MatchOutcome::Filtered));
                    prop_assert!(outcomes[index + 1..].iter().all(|o| *o == MatchOutcome::Duplicate));
                    prop_assert_eq!(correlator.pending_count(), 0);

                    let packet = runtime().block_on(pending.wait()).unwrap();
                    prop_assert_eq!(packet.from, expected);
                }
                None => {
                    prop_assert_eq!(matched, 0);
                    prop_assert!(correlator.is_live(id));
                }
            }
        }

        /// Closing rejects every live waiter and leaves none behind
        #[test]
        fn close_flushes_everything(ids in prop::collection::hash_set(1u32.., 1..30)) {
            let correlator = Arc::new(Correlator::new());
            let waiters: Vec<_> = ids
                .iter()
                .map(|&id| {
                    correlator
                        .register(id, None, ResponseKind::Ack, Duration::from_secs(60), "prop")
                        .unwrap()
                })
                .collect();

            prop_assert_eq!(correlator.close(), ids.len());
            prop_assert_eq!(correlator.pending_count(), 0);

            let rt = runtime();
            for waiter in waiters {
                let result = rt.block_on(waiter.wait());
                prop_assert!(matches!(result, Err(meshlink_core::RequestError::Disconnected)));
            }
        }

        /// Registering an id that is already live is refused
        #[test]
        fn live_ids_are_exclusive(id in 1u32..) {
            let correlator = Arc::new(Correlator::new());
            let _first = correlator
                .register(id, None, ResponseKind::Response, Duration::from_secs(60), "prop")
                .unwrap();
            prop_assert!(correlator
                .register(id, None, ResponseKind::Response, Duration::from_secs(60), "prop")
                .is_err());
        }
    }
}

// ============================================================================
// Routing Classification Properties
// ============================================================================

mod routing_properties {
    use super::*;
    use meshlink_core::{Classification, RequestError, classify};
    use meshlink_proto::{Data, MeshPacket, PortNum, Routing, encode, mesh_packet, routing};

    fn routing_reply(code: i32) -> MeshPacket {
        let payload = encode(&Routing {
            variant: Some(routing::Variant::ErrorReason(code)),
        });
        MeshPacket {
            from: 5,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                portnum: PortNum::RoutingApp as i32,
                payload,
                request_id: 1,
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    proptest! {
        /// Any non-zero error reason is a rejection carrying that code
        #[test]
        fn nonzero_codes_reject(code in prop::num::i32::ANY.prop_filter("none", |c| *c != 0)) {
            match classify(&routing_reply(code)) {
                Classification::Rejected(RequestError::Routing(err)) => {
                    prop_assert_eq!(err.code(), code);
                }
                other => prop_assert!(false, "expected rejection, got {:?}", other),
            }
        }

        /// Packets on other ports are plain replies whatever they carry
        #[test]
        fn other_ports_are_replies(
            port in prop::sample::select(vec![
                PortNum::TextMessageApp,
                PortNum::PositionApp,
                PortNum::AdminApp,
                PortNum::TelemetryApp,
                PortNum::TracerouteApp,
            ]),
            payload in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let packet = MeshPacket {
                payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                    portnum: port as i32,
                    payload,
                    request_id: 9,
                    ..Default::default()
                })),
                ..Default::default()
            };
            prop_assert!(matches!(classify(&packet), Classification::Reply));
        }
    }

    #[test]
    fn zero_code_is_ack() {
        assert!(classify(&routing_reply(0)).is_ack());
    }
}

// ============================================================================
// Packet Id and Log Properties
// ============================================================================

mod id_and_log_properties {
    use super::*;
    use meshlink_core::{AckTracker, Direction, Directory, LoggedMessage, PacketIdGenerator};
    use std::collections::HashSet;

    proptest! {
        /// Generated ids are never zero and never collide with live ids
        #[test]
        fn ids_avoid_zero_and_live(
            live in prop::collection::hash_set(any::<u32>(), 0..50),
            draws in prop::collection::vec(any::<u32>(), 1..50),
        ) {
            // Always end with a candidate that is usable
            let fallback = (1u32..).find(|id| !live.contains(id)).unwrap();
            let mut candidates = draws.into_iter().chain(std::iter::once(fallback));
            let id = PacketIdGenerator::new()
                .next_with(|| candidates.next().unwrap_or(fallback), |id| live.contains(&id));
            prop_assert_ne!(id, 0);
            prop_assert!(!live.contains(&id));
        }

        /// The ack log never exceeds its capacity and keeps the newest records
        #[test]
        fn ack_log_bounded(capacity in 1usize..32, count in 0u32..100) {
            let tracker = AckTracker::new(capacity);
            for id in 1..=count {
                tracker.record_ack(id, 7, 0, 0);
            }
            prop_assert!(tracker.len() <= capacity);
            prop_assert_eq!(tracker.total_recorded(), u64::from(count));
            if count > 0 {
                prop_assert!(tracker.find_ack(count, 7).is_some());
            }
        }

        /// The message log keeps the newest messages in order
        #[test]
        fn message_log_bounded(capacity in 1usize..20, count in 0u32..60) {
            let directory = Directory::new(capacity);
            for id in 1..=count {
                directory.log_message(LoggedMessage {
                    id,
                    from: 1,
                    to: 2,
                    channel: 0,
                    text: id.to_string(),
                    direction: Direction::Inbound,
                    acked_by: None,
                    error_code: None,
                });
            }
            let ids: Vec<u32> = directory.messages().iter().map(|m| m.id).collect();
            let kept = (count as usize).min(capacity);
            prop_assert_eq!(ids.len(), kept);
            let expected: Vec<u32> = (count + 1 - kept as u32..=count).collect();
            prop_assert_eq!(ids, expected);
        }

        /// Node ids print and parse consistently
        #[test]
        fn node_id_text_form(num in any::<u32>()) {
            let text = meshlink_proto::node_id_string(num);
            prop_assert_eq!(text.len(), 9);
            prop_assert_eq!(meshlink_proto::parse_node_id(&text), Some(num));
        }
    }

    #[test]
    fn distinct_random_ids() {
        let generator = PacketIdGenerator::new();
        let ids: HashSet<u32> = (0..200).map(|_| generator.next(|_| false)).collect();
        assert!(ids.len() > 190);
    }
}
