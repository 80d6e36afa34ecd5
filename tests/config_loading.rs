//! Layered configuration: defaults, TOML file, CLI overrides.

use std::io::Write;
use tempfile::NamedTempFile;
use unistudent::config::{ConfigOverrides, EngineOverrides, IdentifierOverrides};
use unistudent::test_support::{enrollment_frame, EnrollmentRow};
use unistudent::{
    IdentifierStyle, KeyComponent, KeyStrength, ResolveError, Resolver, ResolverConfig,
};

fn write_config(contents: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn file_values_override_defaults() -> anyhow::Result<()> {
    let file = write_config(
        r#"
[engine]
max_rounds = 5

[identifier]
style = "plain"
prefix = "STU"
width = 4

[consolidation]
columns = ["nom", "cin"]
"#,
    )?;

    let config = ResolverConfig::load(Some(file.path()), ConfigOverrides::default())?;

    assert_eq!(config.engine.max_rounds, Some(5));
    assert_eq!(config.identifier.style, IdentifierStyle::Plain);
    assert_eq!(config.identifier.prefix, "STU");
    assert_eq!(config.identifier.width, 4);
    assert_eq!(config.identifier.column, "code_etudiant");
    assert_eq!(config.consolidation.columns, vec!["nom", "cin"]);
    assert_eq!(config.ontology.keys.len(), 6);
    Ok(())
}

#[test]
fn cli_overrides_win_over_file() -> anyhow::Result<()> {
    let file = write_config(
        r#"
[engine]
max_rounds = 5

[identifier]
style = "plain"
prefix = "STU"
"#,
    )?;

    let overrides = ConfigOverrides {
        engine: Some(EngineOverrides {
            max_rounds: Some(9),
        }),
        identifier: Some(IdentifierOverrides {
            style: Some(IdentifierStyle::YearPrefixed),
            ..Default::default()
        }),
    };
    let config = ResolverConfig::load(Some(file.path()), overrides)?;

    assert_eq!(config.engine.max_rounds, Some(9));
    assert_eq!(config.identifier.style, IdentifierStyle::YearPrefixed);
    assert_eq!(config.identifier.prefix, "STU");
    Ok(())
}

#[test]
fn custom_key_set_from_file() -> anyhow::Result<()> {
    let file = write_config(
        r#"
[ontology]
academic_year = "annee_universitaire"

[[ontology.keys]]
name = "np_mail"
strength = "weak"
components = [
    { name = { surname = "nom", given_names = "prenoms" } },
    { text = "mail" },
]

[[ontology.strong_identifiers]]
column = "cin"
name = "cin"
"#,
    )?;

    let config = ResolverConfig::load(Some(file.path()), ConfigOverrides::default())?;
    let keys = &config.ontology.keys;
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].strength, KeyStrength::Weak);
    assert!(!keys[0].guarded);
    assert_eq!(keys[0].components[1], KeyComponent::Text("mail".to_string()));

    // Only the columns the custom keys read are required.
    let mut frame = unistudent::Frame::from_records(
        &["nom", "prenoms", "mail", "cin", "annee_universitaire"],
        &[
            vec!["RABE", "Paul", "paul@mail.mg", "", "2023-2024"],
            vec!["Rabe", "Paul", "PAUL@mail.mg", "", "2024-2025"],
        ],
    )?;
    let report = Resolver::new(config)?.resolve(&mut frame)?;
    assert_eq!(report.student_count(), 1);
    Ok(())
}

#[test]
fn malformed_file_is_a_config_error() -> anyhow::Result<()> {
    let file = write_config("[engine]\nmax_rounds = \"many\"\n")?;
    let err = ResolverConfig::load(Some(file.path()), ConfigOverrides::default()).unwrap_err();
    assert!(err.to_string().starts_with("configuration error"));

    let resolve_err: ResolveError = err.into();
    assert!(matches!(resolve_err, ResolveError::InvalidConfig(_)));
    Ok(())
}

#[test]
fn invalid_values_rejected_at_resolver_creation() -> anyhow::Result<()> {
    let file = write_config("[engine]\nmax_rounds = 0\n")?;
    let config = ResolverConfig::load(Some(file.path()), ConfigOverrides::default())?;
    assert!(matches!(
        Resolver::new(config),
        Err(ResolveError::InvalidConfig(_))
    ));

    // Defaults still resolve a normal table.
    let mut frame = enrollment_frame(&[EnrollmentRow::new("A", "B").year("2023-2024")]);
    let report = Resolver::new(ResolverConfig::default())?.resolve(&mut frame)?;
    assert_eq!(report.entities[0].student_id, "ETU2023_000001");
    Ok(())
}
