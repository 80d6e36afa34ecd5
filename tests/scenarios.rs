//! End-to-end resolution scenarios on small hand-built enrollment tables.

use unistudent::test_support::{enrollment_frame, EnrollmentRow};
use unistudent::{Frame, ResolveError, Resolver, ResolverConfig, RowIndex, Table};

mod support;

use support::{partition, resolve_default};

#[test]
fn transitive_chain_consolidates_missing_national_id() {
    let mut frame = enrollment_frame(&[
        EnrollmentRow::new("DUPONT", "JEAN")
            .birthdate("01/01/2000")
            .year("2022-2023"),
        EnrollmentRow::new("DUPONT", "JEAN")
            .cin("123456789012")
            .year("2023-2024"),
        EnrollmentRow::new("Dupont", "Jean")
            .birthdate("01/01/2000")
            .cin("123456789012")
            .year("2024-2025"),
    ]);

    let report = resolve_default(&mut frame);

    assert!(report.converged());
    assert_eq!(report.student_count(), 1);
    let entity = &report.entities[0];
    assert_eq!(entity.members, vec![RowIndex(0), RowIndex(1), RowIndex(2)]);
    assert_eq!(entity.student_id, "ETU2022_000001");
    assert_eq!(entity.earliest_year, Some(2022));

    for row in 0..3 {
        assert_eq!(frame.cell(row, "cin"), Some("123456789012"));
        assert_eq!(frame.cell(row, "naissance_date"), Some("01/01/2000"));
        assert_eq!(frame.cell(row, "code_etudiant"), Some("ETU2022_000001"));
    }
    // Enrollment-level fields stay per row.
    assert_eq!(frame.cell(1, "annee_universitaire"), Some("2023-2024"));
}

#[test]
fn organizational_key_blocked_by_conflicting_national_ids() {
    let mut frame = enrollment_frame(&[
        EnrollmentRow::new("RAKOTO", "Hery")
            .cin("111111111111")
            .phone("0341111111")
            .unit("ENI", "INFO")
            .year("2023-2024"),
        EnrollmentRow::new("Rakoto", "HERY")
            .cin("222222222222")
            .phone("0342222222")
            .unit("ENI", "INFO")
            .year("2023-2024"),
    ]);

    let report = resolve_default(&mut frame);

    assert!(report.converged());
    assert_eq!(report.student_count(), 2);
    assert!(report.merges.is_empty());
    assert_eq!(report.blocked.len(), 1);

    let blocked = &report.blocked[0];
    assert_eq!(blocked.key, "np_composante_mention");
    assert_eq!(blocked.conflict.attribute, "cin");
    assert_eq!(
        blocked.conflict.values,
        vec!["111111111111".to_string(), "222222222222".to_string()]
    );

    assert_ne!(
        frame.cell(0, "code_etudiant"),
        frame.cell(1, "code_etudiant")
    );
    assert_eq!(frame.cell(1, "cin"), Some("222222222222"));
}

#[test]
fn organizational_key_merges_without_contradiction() {
    let mut frame = enrollment_frame(&[
        EnrollmentRow::new("RAKOTO", "Hery")
            .cin("111111111111")
            .unit("ENI", "INFO")
            .year("2023-2024"),
        EnrollmentRow::new("Rakoto", "Hery")
            .birthdate("02/03/2001")
            .unit("ENI", "INFO")
            .year("2024-2025"),
    ]);

    let report = resolve_default(&mut frame);

    assert_eq!(report.student_count(), 1);
    assert_eq!(report.merges.len(), 1);
    assert_eq!(report.merges[0].key, "np_composante_mention");
    assert!(report.blocked.is_empty());
    assert_eq!(frame.cell(1, "cin"), Some("111111111111"));
    assert_eq!(frame.cell(0, "naissance_date"), Some("02/03/2001"));
}

#[test]
fn alternating_strong_key_chain_converges_quickly() {
    // Rows 2k and 2k+1 share a birthdate; rows 2k+1 and 2k+2 share a cin.
    let rows: Vec<EnrollmentRow> = (0..10)
        .map(|i| {
            EnrollmentRow::new("RAJAONA", "Tiana")
                .birthdate(&format!("{:02}/01/2000", i / 2 + 1))
                .cin(&format!("{:012}", (i + 1) / 2 + 1))
                .year("2023-2024")
        })
        .collect();
    let mut frame = enrollment_frame(&rows);

    let report = resolve_default(&mut frame);

    assert_eq!(report.student_count(), 1);
    assert!(report.converged());
    assert!(report.convergence.rounds() <= 2);
    assert!(report.convergence.rounds() < ResolverConfig::default().engine.round_cap(6));
    assert_eq!(report.entities[0].len(), 10);
}

#[test]
fn rows_without_any_key_stay_singletons() {
    let mut frame = enrollment_frame(&[
        EnrollmentRow::new("", "Jean").cin("123").year("2023-2024"),
        EnrollmentRow::new("", "Jean").cin("123").year("2023-2024"),
    ]);

    let report = resolve_default(&mut frame);

    assert_eq!(report.student_count(), 2);
    assert!(report.merges.is_empty());
    assert_eq!(partition(&report).len(), 2);
}

#[test]
fn missing_required_columns_are_all_reported() {
    let mut frame = Frame::from_records(
        &["nom", "prenoms", "naissance_date", "annee_universitaire"],
        &[vec!["DUPONT", "JEAN", "01/01/2000", "2023-2024"]],
    )
    .unwrap();
    let before = frame.clone();

    let err = Resolver::new(ResolverConfig::default())
        .unwrap()
        .resolve(&mut frame)
        .unwrap_err();

    match err {
        ResolveError::MissingColumns { columns } => assert_eq!(
            columns,
            vec![
                "cin".to_string(),
                "cin_lieu".to_string(),
                "telephone".to_string(),
                "mail".to_string(),
                "composante".to_string(),
                "mention".to_string(),
            ]
        ),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(frame, before);
    assert!(!frame.has_column("code_etudiant"));
}

#[test]
fn empty_table_resolves_to_nothing() {
    let mut frame = enrollment_frame(&[]);
    let report = resolve_default(&mut frame);
    assert_eq!(report.student_count(), 0);
    assert!(report.converged());
    assert_eq!(frame.row_count(), 0);
}

#[test]
fn csv_files_round_trip_through_resolution() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("inscriptions.csv");
    let output = dir.path().join("resolved.csv");
    std::fs::write(
        &input,
        "nom,prenoms,naissance_date,cin,cin_lieu,telephone,mail,composante,mention,annee_universitaire\n\
         RABE,Paul,,101010101010,,,,ENI,INFO,2023-2024\n\
         Rabe,Paul,05/06/2002,,,,,ENI,INFO,2024-2025\n",
    )?;

    let mut frame = Frame::from_csv_path(&input)?;
    let report = Resolver::new(ResolverConfig::default())?.resolve(&mut frame)?;
    frame.to_csv_path(&output)?;

    assert_eq!(report.student_count(), 1);
    let written = Frame::from_csv_path(&output)?;
    assert_eq!(written.row_count(), 2);
    assert_eq!(written.cell(1, "cin"), Some("101010101010"));
    assert_eq!(written.cell(0, "naissance_date"), Some("05/06/2002"));
    assert_eq!(written.cell(0, "code_etudiant"), Some("ETU2023_000001"));
    assert_eq!(written.cell(1, "code_etudiant"), Some("ETU2023_000001"));
    Ok(())
}
