use assert_matches::assert_matches;

use kira_reference_builder::domain::{
    AuxiliaryStep, BuildTarget, ClinvarAssembly, EntityKind, InputKind, MandatoryOption,
    Species, SpeciesCatalog,
};
use kira_reference_builder::error::KiraError;

fn human() -> Species {
    Species {
        id: "hsapiens".to_string(),
        scientific_name: "Homo sapiens".to_string(),
        common_name: "human".to_string(),
        default_assembly: "GRCh38".to_string(),
        assemblies: Vec::new(),
    }
}

#[test]
fn species_lookup_ignores_case() {
    let catalog = SpeciesCatalog::new(vec![human()]);
    for name in ["HUMAN", "homo sapiens", "HSAPIENS", " Human "] {
        let found = catalog.resolve(name).unwrap();
        assert_eq!(found.id, "hsapiens", "lookup of {name:?}");
    }
    assert!(catalog.resolve("mouse").is_none());
}

#[test]
fn species_lookup_takes_first_match() {
    let mut shadow = human();
    shadow.id = "hsapiens_alt".to_string();
    let catalog = SpeciesCatalog::new(vec![human(), shadow]);
    assert_eq!(catalog.resolve("human").unwrap().id, "hsapiens");
}

#[test]
fn parse_target_literals() {
    let literals = [
        "genome-sequence",
        "gene",
        "regulation",
        "variation",
        "variation-phen-annot",
        "vep",
        "protein",
        "ppi",
        "conservation",
        "drug",
        "clinvar",
        "cosmic",
        "gwas",
    ];
    for literal in literals {
        let target: BuildTarget = literal.parse().unwrap();
        assert_eq!(target.to_string(), literal);
    }
    assert_eq!(BuildTarget::all().count(), literals.len());

    let err = "genome_sequence".parse::<BuildTarget>().unwrap_err();
    assert_matches!(err, KiraError::InvalidTarget(_));
}

#[test]
fn target_input_specs() {
    assert_eq!(BuildTarget::GenomeSequence.input_spec().kind, InputKind::File);
    assert_eq!(BuildTarget::Gwas.input_spec().kind, InputKind::Directory);
    assert_eq!(
        BuildTarget::Gene.input_spec().mandatory,
        &[MandatoryOption::ReferenceGenomeFile]
    );
    assert_eq!(
        BuildTarget::Clinvar.input_spec().mandatory,
        &[MandatoryOption::Assembly]
    );
    assert_eq!(
        BuildTarget::GenomeSequence.auxiliary(),
        Some(AuxiliaryStep::GenomeInfo)
    );
    assert_eq!(
        BuildTarget::Gene.auxiliary(),
        Some(AuxiliaryStep::ProteinFunctionPrediction)
    );
    assert!(BuildTarget::Cosmic.auxiliary().is_none());
    assert!(!BuildTarget::Drug.is_implemented());
}

#[test]
fn clinvar_assembly_is_case_sensitive() {
    assert_eq!(
        "GRCh37".parse::<ClinvarAssembly>().unwrap(),
        ClinvarAssembly::Grch37
    );
    assert_eq!(
        "GRCh38".parse::<ClinvarAssembly>().unwrap().as_str(),
        "GRCh38"
    );
    let err = "GRCH38".parse::<ClinvarAssembly>().unwrap_err();
    assert_matches!(err, KiraError::InvalidAssembly { assembly, .. } if assembly == "GRCH38");
}

#[test]
fn entity_collections_match_build_categories() {
    assert_eq!(
        EntityKind::GenomeSequence.collection(),
        BuildTarget::GenomeSequence.category().unwrap()
    );
    assert_eq!(
        EntityKind::Mutation.collection(),
        BuildTarget::Cosmic.category().unwrap()
    );
    assert_eq!(
        EntityKind::ProteinProteinInteraction.collection(),
        BuildTarget::Ppi.category().unwrap()
    );
    assert_eq!(EntityKind::Gene.to_string(), "gene");
}
