mod helpers;

use std::fs;

use helpers::{BASE_URL, FakeCatalog, footprint_file, symbol_file};
use kitree_sexpr::kicad::{
    LibraryTable, LibraryTableKind, parse_footprint, parse_symbol_library, properties,
};
use kitree_sync::{
    AssetCache, FieldNames, LibraryBuilder, PartFailure, ProjectLayout, RegistryOutcome,
};

/// R-100 is a variant of R-BASE, which carries the CAD files and the model scale.
fn resistor_catalog() -> FakeCatalog {
    let mut catalog = FakeCatalog::new();
    catalog
        .part(5, "R-BASE", None)
        .attach(5, "Symbol", "R.kicad_sym", &symbol_file(&["R"]))
        .attach(5, "Footprint", "R_0402.kicad_mod", &footprint_file("R_0402"))
        .attach(5, "3D-Model", "R_0402.step", "ISO-10303-21;")
        .parameter(5, "3DModel Scaling", "2, 2, 2")
        .parameter(5, "3DModel Rotation", "0, 0, 90")
        .part(10, "R-100", Some(5))
        .parameter(10, "Schematic Identifier", "R/10k")
        .parameter(10, "3DModel Rotation", "0, 0, 180")
        .attach(10, "Datasheet", "rc0402.pdf", "%PDF")
        .sourcing(
            10,
            (100, "Yageo"),
            "RC0402FR-0710KL",
            &[(200, "LCSC", "C25744"), (201, "Mouser", "603-RC0402")],
        );
    catalog
}

fn builder<'g>(
    catalog: &'g FakeCatalog,
    dir: &std::path::Path,
) -> LibraryBuilder<'g, FakeCatalog> {
    LibraryBuilder::new(
        catalog,
        ProjectLayout::new(dir, "demo"),
        FieldNames::default(),
        AssetCache::new(dir.join(".cache")),
    )
}

#[test]
fn builds_variant_from_parent_assets() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = resistor_catalog();
    let layout = ProjectLayout::new(dir.path(), "demo");

    let report = builder(&catalog, dir.path())
        .build(&["R-100".to_string()])
        .unwrap();
    assert!(report.is_success());

    let built: Vec<_> = report.built().collect();
    assert_eq!(built.len(), 1);
    let (ipn, part) = built[0];
    assert_eq!(ipn, "R-100");
    assert_eq!(part.library_id, "R_10k");
    assert_eq!(part.footprint, "R_0402.kicad_mod");
    assert_eq!(part.model.as_deref(), Some("R_0402.step"));

    // Symbol
    let library = parse_symbol_library(&layout.symbol_lib_path()).unwrap();
    assert_eq!(library.symbol_names(), ["R_10k"]);
    let symbol = library.symbols().next().unwrap();
    let props = properties(symbol.as_list().unwrap());
    assert_eq!(props["Reference"], "R");
    assert_eq!(props["Value"], "R_10k");
    assert_eq!(props["Footprint"], "demo-footprints:R_0402");
    assert_eq!(
        props["Datasheet"],
        format!("{BASE_URL}/media/attachments/part/10/rc0402.pdf")
    );
    assert_eq!(props["Internal Nr."], "R-100");
    assert_eq!(props["Manufacturer"], "Yageo");
    assert_eq!(props["Part Nr."], "RC0402FR-0710KL");
    assert_eq!(props["Supplier"], "LCSC");
    assert_eq!(props["Order Nr."], "C25744");
    assert_eq!(props["Link"], "https://lcsc.test/C25744");
    assert_eq!(props["Package"], "0402");
    let unit_names: Vec<_> = symbol
        .find_all_lists("symbol")
        .iter()
        .filter_map(|unit| unit.get(1).and_then(|n| n.as_text()))
        .collect();
    assert_eq!(unit_names, ["R_10k_0_1", "R_10k_1_1"]);

    // Footprint and model
    let footprint = parse_footprint(&layout.footprint_dir().join("R_0402.kicad_mod")).unwrap();
    let models = footprint.models();
    assert_eq!(models.len(), 1);
    assert_eq!(
        models[0].path,
        "${KIPRJMOD}/demo-libraries/3dmodels/R_0402.step"
    );
    assert_eq!(models[0].scale, [2.0, 2.0, 2.0]);
    assert_eq!(models[0].rotate, [0.0, 0.0, 180.0]);
    assert_eq!(models[0].offset, [0.0, 0.0, 0.0]);
    assert_eq!(
        fs::read_to_string(layout.model_dir().join("R_0402.step")).unwrap(),
        "ISO-10303-21;"
    );

    // Registries
    assert_eq!(
        report.registries,
        [
            (LibraryTableKind::Symbol, RegistryOutcome::Created),
            (LibraryTableKind::Footprint, RegistryOutcome::Created),
        ]
    );
    let fp_table =
        LibraryTable::load_or_new(&dir.path().join("fp-lib-table"), LibraryTableKind::Footprint)
            .unwrap();
    assert!(fp_table.contains("demo-footprints"));
}

#[test]
fn rebuild_keeps_registries_and_drops_stale_files() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = resistor_catalog();
    let layout = ProjectLayout::new(dir.path(), "demo");

    builder(&catalog, dir.path())
        .build(&["R-100".to_string()])
        .unwrap();
    let stale = layout.footprint_dir().join("Old.kicad_mod");
    fs::write(&stale, "(footprint \"Old\")").unwrap();
    let table_before = fs::read_to_string(dir.path().join("sym-lib-table")).unwrap();

    let report = builder(&catalog, dir.path())
        .build(&["R-100".to_string()])
        .unwrap();

    assert!(!stale.exists());
    assert!(report
        .registries
        .iter()
        .all(|(_, outcome)| *outcome == RegistryOutcome::AlreadyPresent));
    assert_eq!(
        fs::read_to_string(dir.path().join("sym-lib-table")).unwrap(),
        table_before
    );
}

#[test]
fn multi_symbol_file_fails_only_that_part() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = resistor_catalog();
    catalog
        .part(20, "OPAMP-1", None)
        .attach(20, "Footprint", "SOIC-8.kicad_mod", &footprint_file("SOIC-8"))
        .attach(20, "Symbol", "opamps.kicad_sym", &symbol_file(&["A", "B"]));
    let layout = ProjectLayout::new(dir.path(), "demo");

    let report = builder(&catalog, dir.path())
        .build(&["OPAMP-1".to_string(), "R-100".to_string()])
        .unwrap();

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "OPAMP-1");
    assert!(matches!(failed[0].1, PartFailure::MultipleSymbols { count: 2 }));

    assert!(!layout.footprint_dir().join("SOIC-8.kicad_mod").exists());
    let library = parse_symbol_library(&layout.symbol_lib_path()).unwrap();
    assert_eq!(library.symbol_names(), ["R_10k"]);
}

#[test]
fn missing_footprint_and_unknown_part_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = resistor_catalog();
    catalog
        .part(30, "IC-1", None)
        .attach(30, "Symbol", "ic.kicad_sym", &symbol_file(&["IC"]));

    let report = builder(&catalog, dir.path())
        .build(&["IC-1".to_string(), "NOPE-1".to_string()])
        .unwrap();

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 2);
    assert!(matches!(
        failed[0].1,
        PartFailure::MissingAsset {
            tag: "Footprint",
            ..
        }
    ));
    assert!(matches!(failed[1].1, PartFailure::NotFound(_)));

    let library = parse_symbol_library(&ProjectLayout::new(dir.path(), "demo").symbol_lib_path())
        .unwrap();
    assert!(library.symbol_names().is_empty());
}

#[test]
fn ambiguous_ipn_fails_only_that_part() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = resistor_catalog();
    catalog.part(40, "C-100", None).part(41, "C-100", None);

    let report = builder(&catalog, dir.path())
        .build(&["C-100".to_string(), "R-100".to_string()])
        .unwrap();

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "C-100");
    assert!(matches!(failed[0].1, PartFailure::Ambiguous { count: 2 }));

    let built: Vec<_> = report.built().map(|(ipn, _)| ipn).collect();
    assert_eq!(built, ["R-100"]);
}

#[test]
fn duplicate_library_id_keeps_first_part() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = resistor_catalog();
    catalog
        .part(11, "R-101", Some(5))
        .parameter(11, "Schematic Identifier", "R_10k");

    let report = builder(&catalog, dir.path())
        .build(&["R-100".to_string(), "R-101".to_string()])
        .unwrap();

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    match failed[0].1 {
        PartFailure::DuplicateLibraryId { id, owner } => {
            assert_eq!(id, "R_10k");
            assert_eq!(owner, "R-100");
        }
        other => panic!("unexpected failure {other}"),
    }
}

#[test]
fn part_without_sourcing_uses_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = resistor_catalog();
    catalog.part(12, "R-102", Some(5));

    let report = builder(&catalog, dir.path())
        .build(&["R-102".to_string()])
        .unwrap();
    let (_, part) = report.built().next().unwrap();
    assert_eq!(part.library_id, "R-102");
    assert!(!part.notes.is_empty());

    let library = parse_symbol_library(&ProjectLayout::new(dir.path(), "demo").symbol_lib_path())
        .unwrap();
    let symbol = library.symbols().next().unwrap();
    let props = properties(symbol.as_list().unwrap());
    assert_eq!(props["Manufacturer"], "n/a");
    assert_eq!(props["Order Nr."], "n/a");
    assert_eq!(props["Datasheet"], "");
}
