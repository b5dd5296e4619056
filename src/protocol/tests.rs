use super::*;

fn msg(atoms: &[Atom]) -> Vec<Atom> {
    atoms.to_vec()
}

fn sym(value: &str) -> Atom {
    Atom::Symbol(value.to_string())
}

fn num(value: f32) -> Atom {
    Atom::Float(value)
}

#[test]
fn test_decodes_move_with_both_coordinates() {
    let decoded = decode(&msg(&[sym("k"), sym("move"), num(10.0), num(20.0)])).unwrap();
    assert_eq!(decoded.key, "k");
    assert_eq!(decoded.command, OverlayCommand::Move { x: 10.0, y: 20.0 });
}

#[test]
fn test_move_missing_y_is_dropped() {
    assert!(decode(&msg(&[sym("k"), sym("move"), num(10.0)])).is_none());
}

#[test]
fn test_visible_uses_half_threshold() {
    let on = decode(&msg(&[sym("k"), sym("visible"), num(0.51)])).unwrap();
    assert_eq!(on.command, OverlayCommand::Visible { flag: true });

    let off = decode(&msg(&[sym("k"), sym("visible"), num(0.5)])).unwrap();
    assert_eq!(off.command, OverlayCommand::Visible { flag: false });
}

#[test]
fn test_symbol_where_number_expected_is_dropped() {
    assert!(decode(&msg(&[sym("k"), sym("size"), sym("big")])).is_none());
    assert!(decode(&msg(&[sym("k"), sym("visible"), sym("yes")])).is_none());
}

#[test]
fn test_number_where_symbol_expected_is_dropped() {
    assert!(decode(&msg(&[sym("k"), sym("text"), num(42.0)])).is_none());
    assert!(decode(&msg(&[sym("k"), sym("load"), num(1.0)])).is_none());
}

#[test]
fn test_missing_or_non_symbol_header_is_dropped() {
    assert!(decode(&[]).is_none());
    assert!(decode(&msg(&[sym("k")])).is_none());
    assert!(decode(&msg(&[num(1.0), sym("move"), num(1.0), num(2.0)])).is_none());
    assert!(decode(&msg(&[sym("k"), num(3.0)])).is_none());
}

#[test]
fn test_unknown_verb_decodes_to_unknown() {
    let decoded = decode(&msg(&[sym("k"), sym("spin"), num(1.0)])).unwrap();
    assert_eq!(
        decoded.command,
        OverlayCommand::Unknown {
            verb: "spin".to_string()
        }
    );
    assert!(!decoded.command.creates());
}

#[test]
fn test_atoms_parse_from_untagged_json() {
    let atoms: Vec<Atom> = serde_json::from_str(r#"["t1", "size", 24]"#).unwrap();
    assert_eq!(
        atoms,
        vec![
            Atom::Symbol("t1".to_string()),
            Atom::Symbol("size".to_string()),
            Atom::Float(24.0)
        ]
    );
}
