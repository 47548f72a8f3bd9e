//! Integration tests: command stack semantics through a `ModelSession`.
//!
//! Every test loads the same fixture and compares emitted outlines, so
//! "equal state" means "equal serialized form".

use am_core::*;
use am_editor::*;
use pretty_assertions::assert_eq;

const FIXTURE: &str = include_str!("fixtures/insurance.am");

fn session() -> ModelSession {
    session_with(EditorConfig::default())
}

fn session_with(config: EditorConfig) -> ModelSession {
    let _ = env_logger::builder().is_test(true).try_init();
    ModelSession::new(parse_model(FIXTURE).expect("fixture parses"), config)
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn outline(session: &ModelSession) -> String {
    emit_model(session.graph())
}

fn boxed(command: impl Command + 'static) -> Box<dyn Command> {
    Box::new(command)
}

fn undo_all(session: &mut ModelSession) -> usize {
    let mut count = 0;
    while session.can_undo() {
        session.undo().expect("undo");
        count += 1;
    }
    count
}

/// Always fails on execute without touching the graph.
struct Exploding;

impl Command for Exploding {
    fn label(&self) -> &str {
        "Explode"
    }

    fn execute(&mut self, _graph: &mut ModelGraph) -> Result<(), CommandError> {
        Err(CommandError::failed("Explode", "boom"))
    }

    fn undo(&mut self, _graph: &mut ModelGraph) -> Result<(), CommandError> {
        Ok(())
    }
}

// ─── Restoring state ────────────────────────────────────────────────────

#[test]
fn undo_to_start_restores_initial_outline() {
    let mut s = session();
    let initial = outline(&s);

    let commands: Vec<Box<dyn Command>> = vec![
        Box::new(SetFeatureCommand::rename(id("customer"), "Client")),
        Box::new(CreateNodeCommand::element(
            ElementType::BusinessService,
            "Claims Service",
        )),
        Box::new(CreateConnectionCommand::derived(
            RelationshipType::Association,
            id("o_customer"),
            id("o_accept"),
            "",
        )),
        Box::new(MoveChildCommand::send_to_back(id("o_note"))),
        Box::new(SetFeatureCommand::set_fill_color(
            id("o_customer"),
            Some(Color::rgb(255, 0, 0)),
        )),
        Box::new(SetFeatureCommand::set_bounds(
            id("o_accept"),
            Bounds::new(300, 100, 140, 60),
        )),
        Box::new(SetFeatureCommand::set_properties(id("customer"), Vec::new())),
        Box::new(SetFeatureCommand::set_purpose(id("insurance"), "Everything")),
    ];
    let count = commands.len();
    for command in commands {
        assert!(s.execute(command).unwrap());
    }
    let delete = delete_from_model(s.graph(), &[id("insurant")]).expect("something to delete");
    assert!(s.execute(delete).unwrap());
    assert!(!s.graph().contains(id("c_plays")));

    let edited = outline(&s);
    assert_ne!(edited, initial);

    assert_eq!(undo_all(&mut s), count + 1);
    assert_eq!(outline(&s), initial);
    assert!(!s.is_dirty());

    // And all the way forward again, ids included.
    while s.can_redo() {
        s.redo().unwrap();
    }
    assert_eq!(outline(&s), edited);
}

#[test]
fn execute_undo_redo_matches_execute() {
    let factories: Vec<fn() -> Box<dyn Command>> = vec![
        || boxed(SetFeatureCommand::rename(id("claim"), "Claim Form")),
        || boxed(SetFeatureCommand::set_locked(id("o_note"), true)),
        || boxed(SetFeatureCommand::set_text_alignment(id("o_note"), TextAlignment::Right)),
        || boxed(SetFeatureCommand::set_font(id("o_register"), Some("Arial 9".into()))),
        || boxed(SetFeatureCommand::set_line_color(id("c_plays"), Some(Color::rgb(0, 0, 0)))),
        || boxed(SetFeatureCommand::reconnect_target(id("r_flow"), id("claim"))),
        || boxed(CreateNodeCommand::view("Second")),
        || boxed(CreateNodeCommand::note(id("process_view"), "Later", Bounds::default())),
        || {
            boxed(CreateNodeCommand::diagram_object(
                id("process_view"),
                id("claim"),
                Bounds::new(400, 10, 120, 55),
            ))
        },
        || {
            boxed(CreateRelationshipCommand::new(
                RelationshipType::Access,
                id("register"),
                id("claim"),
                "writes",
            ))
        },
        || boxed(CreateConnectionCommand::new(RelationshipType::Flow, id("o_register"), id("o_accept"))),
        || boxed(DeleteNodeCommand::new(id("o_note"))),
        || boxed(MoveChildCommand::bring_to_front(id("o_customer"))),
        || boxed(MoveChildCommand::send_backward(id("accept"))),
    ];

    for make in factories {
        let mut s = session();
        let command = make();
        let label = command.label().to_string();
        assert!(s.execute(command).unwrap(), "{label} should execute");
        let after = outline(&s);

        assert_eq!(s.undo().unwrap().as_deref(), Some(label.as_str()));
        assert_eq!(outline(&s), FIXTURE, "{label} undo");
        assert_eq!(s.redo().unwrap().as_deref(), Some(label.as_str()));
        assert_eq!(outline(&s), after, "{label} redo");
    }
}

#[test]
fn redo_reuses_generated_ids() {
    let mut s = session();
    let cmd = CreateNodeCommand::element(ElementType::ApplicationComponent, "Portal");
    s.execute(Box::new(cmd)).unwrap();
    let portal = s.graph().children_of(id("application"))[0];

    s.undo().unwrap();
    assert!(!s.graph().contains(portal));
    s.redo().unwrap();
    assert_eq!(s.graph().children_of(id("application")), vec![portal]);
    assert_eq!(s.graph().get(portal).unwrap().name, "Portal");
}

// ─── History shape ──────────────────────────────────────────────────────

#[test]
fn new_execute_discards_redo_tail() {
    let mut s = session();
    s.execute(Box::new(SetFeatureCommand::rename(id("customer"), "A")))
        .unwrap();
    s.execute(Box::new(SetFeatureCommand::rename(id("customer"), "B")))
        .unwrap();
    s.execute(Box::new(SetFeatureCommand::rename(id("customer"), "C")))
        .unwrap();
    s.undo().unwrap();
    s.undo().unwrap();
    assert!(s.can_redo());

    s.execute(Box::new(SetFeatureCommand::set_documentation(id("customer"), "doc")))
        .unwrap();
    assert!(!s.can_redo());
    assert_eq!(s.redo_label(), None);
    assert_eq!(s.stack().len(), 2);
}

#[test]
fn three_commands_undo_twice_then_execute() {
    let mut s = session();
    let c1 = SetFeatureCommand::rename(id("customer"), "C1");
    let c2 = SetFeatureCommand::set_documentation(id("customer"), "C2");
    let c3 = SetFeatureCommand::rename(id("insurant"), "C3");
    for command in [c1, c2, c3] {
        s.execute(Box::new(command)).unwrap();
    }
    assert_eq!(s.stack().cursor(), 3);

    s.undo().unwrap();
    s.undo().unwrap();
    assert_eq!(s.stack().cursor(), 1);
    let customer = s.graph().get(id("customer")).unwrap();
    assert_eq!(customer.name, "C1");
    assert_eq!(customer.documentation, "");
    assert_eq!(s.graph().get(id("insurant")).unwrap().name, "Insurant");

    let c4 = SetFeatureCommand::set_fill_color(id("o_customer"), Some(Color::rgb(1, 2, 3)));
    s.execute(Box::new(c4)).unwrap();
    assert_eq!(s.stack().len(), 2);
    assert_eq!(s.stack().cursor(), 2);
    assert_eq!(s.undo_label(), Some("Fill Colour"));
    assert_eq!(s.redo().unwrap(), None);
    assert_eq!(s.stack().cursor(), 2);
}

#[test]
fn move_two_to_zero_and_back() {
    let mut s = session();
    let business = id("business");
    let original = s.graph().children_of(business);
    assert_eq!(original.len(), 5);
    assert_eq!(original[2], id("claim"));

    s.execute(Box::new(MoveChildCommand::to_position(id("claim"), 0)))
        .unwrap();
    assert_eq!(s.graph().position_of(id("claim")), Some(0));

    s.undo().unwrap();
    assert_eq!(s.graph().position_of(id("claim")), Some(2));
    assert_eq!(s.graph().children_of(business), original);
}

// ─── Compound commands ──────────────────────────────────────────────────

#[test]
fn compound_prunes_non_executable_children() {
    let mut s = session();
    let mut compound = CompoundCommand::new("Edit");
    compound.add(Box::new(SetFeatureCommand::rename(id("claim"), "Policy Claim")));
    // Already the current value.
    compound.add(Box::new(SetFeatureCommand::rename(id("accept"), "Accept")));

    let command = compound.finish(s.graph()).expect("one child remains");
    assert_eq!(command.label(), "Rename");
    assert!(s.execute(command).unwrap());
    assert_eq!(s.stack().len(), 1);
    assert_eq!(s.graph().get(id("claim")).unwrap().name, "Policy Claim");
}

#[test]
fn compound_with_nothing_to_do_is_not_pushed() {
    let mut s = session();
    let make = || {
        let mut compound = CompoundCommand::new("Nothing");
        compound.add(Box::new(SetFeatureCommand::rename(id("claim"), "Claim")));
        compound.add(Box::new(SetFeatureCommand::rename(id("accept"), "Accept")));
        compound
    };
    assert!(make().finish(s.graph()).is_none());

    // Submitted without finishing, the stack still refuses it.
    assert!(!s.execute(Box::new(make())).unwrap());
    assert_eq!(s.stack().len(), 0);
    assert_eq!(outline(&s), FIXTURE);
    assert!(!s.is_dirty());
}

#[test]
fn compound_undo_is_one_step() {
    let mut s = session();
    let mut compound = CompoundCommand::new("Restyle");
    compound.add(Box::new(SetFeatureCommand::set_fill_color(
        id("o_accept"),
        Some(Color::rgb(200, 200, 255)),
    )));
    compound.add(Box::new(SetFeatureCommand::set_font_color(
        id("o_accept"),
        Some(Color::rgb(0, 0, 128)),
    )));
    compound.add(Box::new(MoveChildCommand::bring_to_front(id("o_accept"))));
    let command = compound.finish(s.graph()).unwrap();
    s.execute(command).unwrap();
    assert_eq!(s.undo_label(), Some("Restyle"));

    s.undo().unwrap();
    assert_eq!(outline(&s), FIXTURE);
}

// ─── Dirty flag ─────────────────────────────────────────────────────────

#[test]
fn dirty_flag_follows_saved_cursor() {
    let mut s = session();
    assert!(!s.is_dirty());

    s.execute(Box::new(SetFeatureCommand::rename(id("claim"), "One")))
        .unwrap();
    assert!(s.is_dirty());
    s.mark_saved();
    assert!(!s.is_dirty());

    s.execute(Box::new(SetFeatureCommand::rename(id("claim"), "Two")))
        .unwrap();
    assert!(s.is_dirty());
    s.undo().unwrap();
    assert!(!s.is_dirty());
    s.undo().unwrap();
    assert!(s.is_dirty());
    s.redo().unwrap();
    assert!(!s.is_dirty());
}

#[test]
fn saved_state_lost_to_truncation_stays_dirty() {
    let mut s = session();
    s.execute(Box::new(SetFeatureCommand::rename(id("claim"), "Saved")))
        .unwrap();
    s.mark_saved();
    s.undo().unwrap();
    s.execute(Box::new(SetFeatureCommand::rename(id("claim"), "Other")))
        .unwrap();
    assert!(s.is_dirty());
    s.undo().unwrap();
    assert!(s.is_dirty());
}

// ─── Failures & limits ──────────────────────────────────────────────────

#[test]
fn failing_command_is_not_recorded() {
    let mut s = session();
    s.execute(Box::new(SetFeatureCommand::rename(id("claim"), "X")))
        .unwrap();
    s.undo().unwrap();

    let err = s.execute(Box::new(Exploding)).unwrap_err();
    assert!(matches!(err, CommandError::Failed { .. }));
    assert_eq!(err.to_string(), "Explode: boom");
    assert_eq!(s.stack().len(), 1);
    assert!(s.can_redo());
    assert_eq!(outline(&s), FIXTURE);
}

#[test]
fn undo_depth_from_config() {
    let config = EditorConfig::from_json(r#"{ "max_undo_depth": 3 }"#).unwrap();
    let mut s = session_with(config);
    for n in 0..5 {
        s.execute(Box::new(SetFeatureCommand::rename(id("claim"), format!("n{n}"))))
            .unwrap();
    }
    assert_eq!(s.stack().len(), 3);
    assert_eq!(undo_all(&mut s), 3);
    assert_eq!(s.graph().get(id("claim")).unwrap().name, "n1");
}

#[test]
fn delete_and_restore_references() {
    let mut s = session();
    let delete = delete_from_model(s.graph(), &[id("customer")]).unwrap();
    s.execute(delete).unwrap();
    for gone in ["customer", "r_plays", "o_customer", "c_plays"] {
        assert!(!s.graph().contains(id(gone)), "{gone} still present");
    }
    assert!(s.graph().contains(id("insurant")));

    s.undo().unwrap();
    assert_eq!(outline(&s), FIXTURE);
}
