use battleship_lan::protocol::{decode, encode, ProtocolError};
use battleship_lan::{Message, ShipKind, ShotReport};

fn all_variants() -> Vec<Message> {
    vec![
        Message::Handshake,
        Message::PlacementDone,
        Message::FireShot { x: 0, y: 9 },
        Message::ShotResult(ShotReport {
            x: 4,
            y: 2,
            hit: true,
            sunk: true,
            sunk_kind: Some(ShipKind::Submarine),
        }),
        Message::AbilityRowBomb { row: 7 },
        Message::AbilityResult {
            results: (0..10)
                .map(|x| ShotReport {
                    x,
                    y: 7,
                    hit: x % 3 == 0,
                    sunk: false,
                    sunk_kind: None,
                })
                .collect(),
        },
        Message::GameResult { you_won: false },
    ]
}

#[test]
fn test_every_variant_survives_the_wire() {
    for msg in all_variants() {
        let text = encode(&msg).unwrap();
        assert!(!text.contains('\n'), "{} encoded with a newline", msg.kind());
        assert_eq!(decode(&text).unwrap(), msg);
    }
}

#[test]
fn test_messages_are_tagged_objects() {
    let text = encode(&Message::FireShot { x: 3, y: 5 }).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "FireShot");
    assert_eq!(value["x"], 3);
    assert_eq!(value["y"], 5);

    let text = encode(&Message::GameResult { you_won: true }).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "GameResult");
    assert_eq!(value["you_won"], true);
}

#[test]
fn test_shot_result_without_kind_decodes() {
    let msg = decode(r#"{"type":"ShotResult","x":1,"y":2,"hit":false,"sunk":false}"#).unwrap();
    assert_eq!(
        msg,
        Message::ShotResult(ShotReport {
            x: 1,
            y: 2,
            hit: false,
            sunk: false,
            sunk_kind: None,
        })
    );
}

#[test]
fn test_negative_coordinates_keep_their_value() {
    let msg = Message::FireShot { x: -1, y: 42 };
    assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
    let report = ShotReport {
        x: -1,
        y: 42,
        hit: false,
        sunk: false,
        sunk_kind: None,
    };
    assert_eq!(report.coordinate(), None);
}

#[test]
fn test_unknown_or_broken_messages_are_errors() {
    assert!(matches!(
        decode(r#"{"type":"Surrender"}"#),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(
        decode(r#"{"type":"FireShot","x":1}"#),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(decode("{"), Err(ProtocolError::Malformed(_))));
    assert!(matches!(
        decode(r#"{"x":1,"y":1}"#),
        Err(ProtocolError::Malformed(_))
    ));
}
