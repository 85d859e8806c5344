//! Tests for the JSON wire contract.

use serde_json::json;
use strictly_rooms::{
    CandidateMove, ChatSender, ClientCommand, GameEnd, Role, ServerEvent, TerminalReason,
};
use strum::IntoEnumIterator;

#[test]
fn test_decode_move_with_promotion() {
    let command = ClientCommand::decode(
        r#"{"type":"move","session_key":"g1","move":{"from":"a7","to":"a8","promotion":"q"}}"#,
    )
    .expect("Valid move frame");

    assert_eq!(
        command,
        ClientCommand::Move {
            session_key: "g1".to_string(),
            candidate: CandidateMove::new(
                "a7".to_string(),
                "a8".to_string(),
                Some("q".to_string())
            ),
        }
    );
    assert_eq!(command.session_key(), "g1");
}

#[test]
fn test_decode_move_without_promotion() {
    let frame = r#"{"type":"move","session_key":"g1","move":{"from":"e2","to":"e4"}}"#;
    let command = ClientCommand::decode(frame).expect("Valid move frame");
    match command {
        ClientCommand::Move { candidate, .. } => assert_eq!(candidate.promotion, None),
        other => panic!("Expected move, got {:?}", other),
    }
}

#[test]
fn test_decode_every_command_kind() {
    let frames = [
        json!({"type": "join", "session_key": "k"}),
        json!({"type": "set_name", "session_key": "k", "name": "Alice"}),
        json!({"type": "chat", "session_key": "k", "message": "hi"}),
        json!({"type": "resign", "session_key": "k"}),
    ];
    for frame in frames {
        let command = ClientCommand::decode(&frame.to_string()).expect("Valid frame");
        assert_eq!(command.session_key(), "k");
    }
}

#[test]
fn test_decode_rejects_bad_frames() {
    for frame in [
        "",
        "[]",
        r#"{"session_key":"g1"}"#,
        r#"{"type":"move","session_key":"g1"}"#,
        r#"{"type":"resign","session_key":""}"#,
    ] {
        let err = ClientCommand::decode(frame).expect_err("Frame should be rejected");
        assert!(!err.message.is_empty());
        assert!(err.to_string().starts_with("Invalid command:"));
    }
}

#[test]
fn test_event_tags_are_snake_case() {
    let event = ServerEvent::RoleAssigned {
        role: Role::SecondMover,
    };
    let value: serde_json::Value =
        serde_json::from_str(&event.encode().expect("Encodes")).expect("Valid JSON");
    assert_eq!(value, json!({"type": "role_assigned", "role": "second_mover"}));

    let value = serde_json::to_value(ServerEvent::SpectatorAssigned).expect("Encodes");
    assert_eq!(value, json!({"type": "spectator_assigned"}));
}

#[test]
fn test_move_applied_uses_move_field() {
    let event = ServerEvent::MoveApplied {
        candidate: CandidateMove::new("e2".to_string(), "e4".to_string(), None),
    };
    let value = serde_json::to_value(event).expect("Encodes");
    assert_eq!(
        value,
        json!({"type": "move_applied", "move": {"from": "e2", "to": "e4"}})
    );
}

#[test]
fn test_game_ended_reason_shape() {
    let resigned = ServerEvent::GameEnded {
        reason: GameEnd::Resignation {
            winner: Role::FirstMover,
        },
    };
    assert_eq!(
        serde_json::to_value(resigned).expect("Encodes"),
        json!({"type": "game_ended", "reason": {"kind": "resignation", "winner": "first_mover"}})
    );

    let mated = ServerEvent::GameEnded {
        reason: GameEnd::Checkmate,
    };
    assert_eq!(
        serde_json::to_value(mated).expect("Encodes"),
        json!({"type": "game_ended", "reason": {"kind": "checkmate"}})
    );
}

#[test]
fn test_chat_and_names_encode() {
    let chat = ServerEvent::ChatDelivered {
        sender: ChatSender::Spectator,
        display_name: "Spectator".to_string(),
        message: "gg".to_string(),
    };
    assert_eq!(
        serde_json::to_value(chat).expect("Encodes"),
        json!({
            "type": "chat_delivered",
            "sender": "spectator",
            "display_name": "Spectator",
            "message": "gg"
        })
    );

    let names = ServerEvent::NameMapping {
        first_mover: Some("Alice".to_string()),
        second_mover: None,
    };
    assert_eq!(
        serde_json::to_value(names).expect("Encodes"),
        json!({"type": "name_mapping", "first_mover": "Alice", "second_mover": null})
    );
}

#[test]
fn test_game_end_display() {
    assert_eq!(GameEnd::Checkmate.to_string(), "checkmate");
    assert_eq!(GameEnd::Draw.to_string(), "draw");
    assert_eq!(GameEnd::ThreefoldRepetition.to_string(), "draw by repetition");
    assert_eq!(
        GameEnd::InsufficientMaterial.to_string(),
        "draw by insufficient material"
    );
    assert_eq!(
        GameEnd::Resignation {
            winner: Role::FirstMover
        }
        .to_string(),
        "first-mover wins by resignation"
    );
}

#[test]
fn test_terminal_priority() {
    use TerminalReason::*;
    assert_eq!(
        TerminalReason::most_significant([InsufficientMaterial, Stalemate, Draw]),
        Some(Draw)
    );
    assert_eq!(
        TerminalReason::most_significant([ThreefoldRepetition, Checkmate]),
        Some(Checkmate)
    );
    assert_eq!(
        TerminalReason::most_significant([InsufficientMaterial, ThreefoldRepetition]),
        Some(ThreefoldRepetition)
    );
    assert_eq!(TerminalReason::most_significant([]), None);

    for reason in TerminalReason::iter() {
        assert_eq!(GameEnd::from(reason).to_string(), reason.to_string());
    }
}

#[test]
fn test_role_opponent() {
    for role in Role::iter() {
        assert_ne!(role, role.opponent());
        assert_eq!(role, role.opponent().opponent());
    }
}
