use super::*;

#[test]
fn hex_parse_accepts_hash_and_case() {
    assert_eq!(HexColor::parse("#ff0000").unwrap(), HexColor::rgb(255, 0, 0));
    assert_eq!(HexColor::parse("FF0000").unwrap(), HexColor::rgb(255, 0, 0));
    assert_eq!(HexColor::parse("#1a2B3c").unwrap(), HexColor::rgb(0x1a, 0x2b, 0x3c));
}

#[test]
fn hex_parse_rejects_malformed() {
    for bad in ["", "#", "#fff", "#ff00001", "#ff00zz", "#ff0000ff", "red"] {
        assert!(HexColor::parse(bad).is_err(), "{bad} should fail");
    }
}

#[test]
fn white_detection_is_case_insensitive() {
    assert!(HexColor::parse("#ffffff").unwrap().is_white());
    assert!(HexColor::parse("#FFFFFF").unwrap().is_white());
    assert!(!HexColor::parse("#FFFFFE").unwrap().is_white());
}

#[test]
fn hex_display_is_uppercase_with_hash() {
    assert_eq!(HexColor::rgb(0x0a, 0xbc, 0xde).to_string(), "#0ABCDE");
}

#[test]
fn hex_serde_uses_string_form() {
    let c: HexColor = serde_json::from_str("\"#00ff7f\"").unwrap();
    assert_eq!(c, HexColor::rgb(0, 255, 127));
    assert_eq!(serde_json::to_string(&c).unwrap(), "\"#00FF7F\"");
    assert!(serde_json::from_str::<HexColor>("\"#00ff7\"").is_err());
}

#[test]
fn view_parse_and_serde() {
    assert_eq!("Front".parse::<View>().unwrap(), View::Front);
    assert_eq!("back".parse::<View>().unwrap(), View::Back);
    assert!("side".parse::<View>().is_err());
    assert_eq!(serde_json::to_string(&View::Back).unwrap(), "\"back\"");
}

#[test]
fn straight_to_premul() {
    let p = Rgba8Premul::from_straight_rgba(200, 100, 0, 128);
    assert_eq!(p.to_array(), [100, 50, 0, 128]);
}
