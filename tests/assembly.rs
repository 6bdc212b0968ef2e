mod common;

use common::{Fixture, RecordingSource, drawing_count, ids, texts};
use proposal_builder::docx::Document;
use proposal_builder::{
    Assembler, AssemblyRequest, ProposalBuilder, ProposalError, ValidationError,
};

fn request(technologies: &[&str], models: &[&str]) -> AssemblyRequest {
    AssemblyRequest {
        technologies: ids(technologies),
        models: ids(models),
        design_description: "Two data centres in active/passive HA".to_string(),
        ..AssemblyRequest::new("Acme", "NetUpgrade")
    }
}

#[test]
fn sections_follow_master_technologies_design_models() {
    let fx = Fixture::new();
    let assembled = Assembler::new(&fx.config)
        .assemble(request(&["SD-WAN", "NGFW"], &["FG-601F", "FG-100F"]))
        .unwrap();

    assert!(assembled.is_complete());
    assert_eq!(
        assembled.sections,
        vec!["SD-WAN", "NGFW", "Design", "FG-601F", "FG-100F"]
    );
    assert_eq!(
        texts(&assembled.document),
        vec![
            "(Logo)",
            "Technical Proposal for Acme",
            "Project: NetUpgrade",
            "SD-WAN for Acme",
            "NGFW for Acme",
            "Design for Acme",
            "<<Design>>",
            "Two data centres in active/passive HA",
            "FG-601F datasheet",
            "Prepared for Acme",
            "FG-100F datasheet",
            "Prepared for Acme",
        ]
    );
}

#[test]
fn unresolvable_fragment_is_reported_and_rest_kept() {
    let fx = Fixture::new();
    let assembled = Assembler::new(&fx.config)
        .assemble(request(&["NGFW", "SASE"], &["FG-60F", "FG-100F"]))
        .unwrap();

    let missing: Vec<&str> = assembled.missing.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(missing, vec!["SASE", "FG-60F"]);
    assert!(!assembled.is_complete());
    assert_eq!(assembled.sections, vec!["NGFW", "Design", "FG-100F"]);
    assert!(texts(&assembled.document).contains(&"FG-100F datasheet".to_string()));
}

#[test]
fn invalid_request_never_loads_a_template() {
    let fx = Fixture::new();
    let source = RecordingSource::default();

    let err = Assembler::with_source(&fx.config, &source)
        .assemble(AssemblyRequest::new("", "NetUpgrade"))
        .unwrap_err();
    assert!(matches!(
        err,
        ProposalError::Validation(ValidationError::MissingField("customer name"))
    ));

    let err = Assembler::with_source(&fx.config, &source)
        .assemble(request(&["NOPE"], &[]))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(source.loads.borrow().is_empty());
}

#[test]
fn loads_master_then_fragments_in_order() {
    let fx = Fixture::new();
    let source = RecordingSource::default();
    Assembler::with_source(&fx.config, &source)
        .assemble(request(&["NGFW"], &["FG-601F"]))
        .unwrap();

    assert_eq!(
        *source.loads.borrow(),
        vec![
            fx.config.master_path(),
            fx.config.technology_path("NGFW"),
            fx.config.design_path(),
            fx.config.model_path("FG-601F"),
        ]
    );
}

#[test]
fn acme_scenario_writes_named_file_and_history() {
    let fx = Fixture::new();
    let builder = ProposalBuilder::new(fx.config.clone());
    let report = builder.create(request(&["NGFW"], &["FG-601F"])).unwrap();

    assert_eq!(report.filename, "Acme_NetUpgrade_Technical Proposal ver 1.0.docx");
    assert!(report.is_complete());
    assert_eq!(report.path, fx.config.output.dir.join(&report.filename));

    let written = Document::open(&report.path).unwrap();
    let all = texts(&written);
    assert!(all.iter().all(|t| !t.contains("<<Customer Name>>")));
    assert!(all.contains(&"NGFW for Acme".to_string()));
    assert!(all.contains(&"Design for Acme".to_string()));
    assert!(all.contains(&"Prepared for Acme".to_string()));
    assert_eq!(drawing_count(&written), 0);

    let history = builder.history().load().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, report.record_id);
    assert_eq!(history[0].filename, report.filename);
    assert_eq!(history[0].technologies, vec!["NGFW"]);
    assert_eq!(history[0].logo, None);
}

#[test]
fn images_are_embedded_and_temp_files_removed() {
    let fx = Fixture::new();
    let (logo, logo_path) = fx.upload("logo", 20, 10);
    let (topology, topology_path) = fx.upload("topology", 30, 30);

    let mut req = request(&["NGFW"], &[]);
    req.logo = Some(logo);
    req.topology = Some(topology);
    let report = ProposalBuilder::new(fx.config.clone()).create(req).unwrap();

    assert!(!logo_path.exists());
    assert!(!topology_path.exists());

    let written = Document::open(&report.path).unwrap();
    assert_eq!(drawing_count(&written), 2);
    let all = texts(&written);
    assert!(!all.iter().any(|t| t.contains("(Logo)") || t.contains("<<Design>>")));

    let history = ProposalBuilder::new(fx.config.clone()).history().load().unwrap();
    assert_eq!(history[0].logo.as_deref(), Some("logo.png"));
    assert_eq!(history[0].topology.as_deref(), Some("topology.png"));
}

#[test]
fn master_failure_is_fatal_and_cleans_up() {
    let fx = Fixture::new();
    std::fs::remove_file(fx.config.master_path()).unwrap();
    let (logo, logo_path) = fx.upload("logo", 4, 4);
    let (topology, topology_path) = fx.upload("topology", 4, 4);

    let mut req = request(&["NGFW"], &[]);
    req.logo = Some(logo);
    req.topology = Some(topology);
    let err = ProposalBuilder::new(fx.config.clone()).create(req).unwrap_err();

    assert!(matches!(err, ProposalError::MasterLoad { .. }));
    assert!(!logo_path.exists());
    assert!(!topology_path.exists());
    assert!(!fx.config.output.dir.exists());
    assert!(!fx.config.output.history_file.exists());
}

#[test]
fn undecodable_logo_is_fatal() {
    let fx = Fixture::new();
    let logo = proposal_builder::ScopedImage::from_bytes(
        "logo",
        "logo.png",
        Some("image/png"),
        b"not really a png",
        &fx.policy(),
    )
    .unwrap()
    .unwrap();
    let logo_path = logo.path().to_path_buf();

    let mut req = request(&[], &[]);
    req.logo = Some(logo);
    let err = Assembler::new(&fx.config).assemble(req).unwrap_err();

    assert!(matches!(err, ProposalError::MasterImage { ref token, .. } if token == "(Logo)"));
    assert!(!logo_path.exists());
}

#[test]
fn missing_design_still_releases_topology() {
    let fx = Fixture::new();
    std::fs::remove_file(fx.config.design_path()).unwrap();
    let (topology, topology_path) = fx.upload("topology", 8, 8);

    let mut req = request(&["NGFW"], &["FG-100F"]);
    req.topology = Some(topology);
    let assembled = Assembler::new(&fx.config).assemble(req).unwrap();

    assert_eq!(assembled.missing.len(), 1);
    assert_eq!(assembled.missing[0].id, "Design");
    assert_eq!(assembled.sections, vec!["NGFW", "FG-100F"]);
    assert!(!topology_path.exists());
}

#[test]
fn duplicate_selections_appear_once() {
    let fx = Fixture::new();
    let assembled = Assembler::new(&fx.config)
        .assemble(request(&["NGFW", "NGFW"], &["FG-100F", "FG-100F"]))
        .unwrap();
    assert_eq!(assembled.sections, vec!["NGFW", "Design", "FG-100F"]);
}

#[test]
fn partial_proposal_is_still_saved_with_missing_recorded() {
    let fx = Fixture::new();
    let builder = ProposalBuilder::new(fx.config.clone());
    let report = builder.create(request(&["SASE"], &[])).unwrap();

    assert!(report.path.exists());
    assert_eq!(report.missing.len(), 1);
    let history = builder.history().load().unwrap();
    assert_eq!(history[0].missing, report.missing);
}
