use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: String,
    pub scientific_name: String,
    pub common_name: String,
    pub default_assembly: String,
    #[serde(default)]
    pub assemblies: Vec<String>,
}

impl Species {
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        name.eq_ignore_ascii_case(&self.scientific_name)
            || name.eq_ignore_ascii_case(&self.common_name)
            || name.eq_ignore_ascii_case(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesCatalog {
    species: Vec<Species>,
}

impl SpeciesCatalog {
    pub fn new(species: Vec<Species>) -> Self {
        Self { species }
    }

    /// First species in catalog order whose scientific name, common name or id
    /// equals `name`, ignoring case.
    pub fn resolve(&self, name: &str) -> Option<&Species> {
        self.species.iter().find(|sp| sp.matches(name))
    }

    pub fn all(&self) -> &[Species] {
        &self.species
    }

    /// Store key for a species and optional assembly. A requested assembly
    /// takes the catalog spelling when it matches one ignoring case, so
    /// "grch38" and "GRCh38" share a key.
    pub fn adaptor_key(
        &self,
        name: &str,
        assembly: Option<&str>,
    ) -> Option<(&Species, AdaptorKey)> {
        let sp = self.resolve(name)?;
        let assembly = match assembly {
            None => sp.default_assembly.clone(),
            Some(requested) => std::iter::once(&sp.default_assembly)
                .chain(sp.assemblies.iter())
                .find(|known| known.eq_ignore_ascii_case(requested))
                .cloned()
                .unwrap_or_else(|| requested.to_string()),
        };
        Some((
            sp,
            AdaptorKey {
                species: sp.id.clone(),
                assembly,
            },
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdaptorKey {
    pub species: String,
    pub assembly: String,
}

impl fmt::Display for AdaptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.species, self.assembly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MandatoryOption {
    Species,
    Assembly,
    ReferenceGenomeFile,
}

impl MandatoryOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            MandatoryOption::Species => "species",
            MandatoryOption::Assembly => "assembly",
            MandatoryOption::ReferenceGenomeFile => "reference-genome-file",
        }
    }
}

impl fmt::Display for MandatoryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub kind: InputKind,
    pub mandatory: &'static [MandatoryOption],
}

/// Metadata script run before the parser for some targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxiliaryStep {
    GenomeInfo,
    ProteinFunctionPrediction,
}

impl AuxiliaryStep {
    pub fn script(&self) -> &'static str {
        match self {
            AuxiliaryStep::GenomeInfo => "./genome_info.pl",
            AuxiliaryStep::ProteinFunctionPrediction => "./protein_function_prediction_matrices.pl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTarget {
    GenomeSequence,
    Gene,
    Regulation,
    Variation,
    #[serde(rename = "variation-phen-annot")]
    VariationPhenotypeAnnotation,
    Vep,
    Protein,
    Ppi,
    Conservation,
    Drug,
    Clinvar,
    Cosmic,
    Gwas,
}

struct TargetRow {
    target: BuildTarget,
    name: &'static str,
    input: InputSpec,
    category: Option<&'static str>,
    auxiliary: Option<AuxiliaryStep>,
}

const fn row(
    target: BuildTarget,
    name: &'static str,
    kind: InputKind,
    mandatory: &'static [MandatoryOption],
    category: Option<&'static str>,
    auxiliary: Option<AuxiliaryStep>,
) -> TargetRow {
    TargetRow {
        target,
        name,
        input: InputSpec { kind, mandatory },
        category,
        auxiliary,
    }
}

use InputKind::{Directory, File};

static TARGETS: [TargetRow; 13] = [
    row(
        BuildTarget::GenomeSequence,
        "genome-sequence",
        File,
        &[],
        Some("genome_sequence"),
        Some(AuxiliaryStep::GenomeInfo),
    ),
    row(
        BuildTarget::Gene,
        "gene",
        Directory,
        &[MandatoryOption::ReferenceGenomeFile],
        Some("gene"),
        Some(AuxiliaryStep::ProteinFunctionPrediction),
    ),
    row(
        BuildTarget::Regulation,
        "regulation",
        Directory,
        &[],
        Some("regulatory_region"),
        None,
    ),
    row(BuildTarget::Variation, "variation", Directory, &[], None, None),
    row(
        BuildTarget::VariationPhenotypeAnnotation,
        "variation-phen-annot",
        Directory,
        &[],
        Some("variation_phenotype_annotation"),
        None,
    ),
    row(BuildTarget::Vep, "vep", File, &[], None, None),
    row(
        BuildTarget::Protein,
        "protein",
        Directory,
        &[MandatoryOption::Species],
        Some("protein"),
        None,
    ),
    row(
        BuildTarget::Ppi,
        "ppi",
        File,
        &[MandatoryOption::Species],
        Some("protein_protein_interaction"),
        None,
    ),
    row(BuildTarget::Conservation, "conservation", Directory, &[], None, None),
    row(BuildTarget::Drug, "drug", File, &[], Some("drug"), None),
    row(
        BuildTarget::Clinvar,
        "clinvar",
        File,
        &[MandatoryOption::Assembly],
        Some("clinvar"),
        None,
    ),
    row(BuildTarget::Cosmic, "cosmic", File, &[], Some("cosmic"), None),
    row(BuildTarget::Gwas, "gwas", Directory, &[], Some("gwas"), None),
];

impl BuildTarget {
    pub fn all() -> impl Iterator<Item = BuildTarget> {
        TARGETS.iter().map(|row| row.target)
    }

    fn row(&self) -> &'static TargetRow {
        // TARGETS is declared in enum order
        &TARGETS[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.row().name
    }

    pub fn input_spec(&self) -> InputSpec {
        self.row().input
    }

    /// Entity category the serializer writes under; `None` lets the parser pick
    /// a file per record.
    pub fn category(&self) -> Option<&'static str> {
        self.row().category
    }

    pub fn auxiliary(&self) -> Option<AuxiliaryStep> {
        self.row().auxiliary
    }

    pub fn is_implemented(&self) -> bool {
        !matches!(self, BuildTarget::Drug)
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildTarget {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TARGETS
            .iter()
            .find(|row| row.name == value)
            .map(|row| row.target)
            .ok_or_else(|| KiraError::InvalidTarget(value.to_string()))
    }
}

pub const GRCH37_ASSEMBLY: &str = "GRCh37";
pub const GRCH38_ASSEMBLY: &str = "GRCh38";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClinvarAssembly {
    #[serde(rename = "GRCh37")]
    Grch37,
    #[serde(rename = "GRCh38")]
    Grch38,
}

impl ClinvarAssembly {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinvarAssembly::Grch37 => GRCH37_ASSEMBLY,
            ClinvarAssembly::Grch38 => GRCH38_ASSEMBLY,
        }
    }
}

impl FromStr for ClinvarAssembly {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            GRCH37_ASSEMBLY => Ok(ClinvarAssembly::Grch37),
            GRCH38_ASSEMBLY => Ok(ClinvarAssembly::Grch38),
            _ => Err(KiraError::InvalidAssembly {
                assembly: value.to_string(),
                accepted: format!("{GRCH37_ASSEMBLY}, {GRCH38_ASSEMBLY}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Gene,
    Transcript,
    Chromosome,
    Exon,
    VariantEffect,
    VariantAnnotation,
    Protein,
    Snp,
    GenomeSequence,
    Cytoband,
    Xref,
    Tfbs,
    RegulatoryRegion,
    Mirna,
    Mutation,
    Clinvar,
    Clinical,
    CpgIsland,
    StructuralVariation,
    Pathway,
    ProteinProteinInteraction,
    Variation,
    ConservedRegion,
    ProteinFunctionPredictor,
    VariationPhenotypeAnnotation,
}

impl EntityKind {
    pub fn all() -> &'static [EntityKind] {
        Self::value_variants()
    }

    /// Collection name the entity is stored under, matching the serializer
    /// categories where a build target produces the entity.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Gene => "gene",
            EntityKind::Transcript => "transcript",
            EntityKind::Chromosome => "chromosome",
            EntityKind::Exon => "exon",
            EntityKind::VariantEffect => "variant_effect",
            EntityKind::VariantAnnotation => "variant_annotation",
            EntityKind::Protein => "protein",
            EntityKind::Snp => "snp",
            EntityKind::GenomeSequence => "genome_sequence",
            EntityKind::Cytoband => "cytoband",
            EntityKind::Xref => "xref",
            EntityKind::Tfbs => "tfbs",
            EntityKind::RegulatoryRegion => "regulatory_region",
            EntityKind::Mirna => "mirna",
            EntityKind::Mutation => "cosmic",
            EntityKind::Clinvar => "clinvar",
            EntityKind::Clinical => "clinical",
            EntityKind::CpgIsland => "cpg_island",
            EntityKind::StructuralVariation => "structural_variation",
            EntityKind::Pathway => "pathway",
            EntityKind::ProteinProteinInteraction => "protein_protein_interaction",
            EntityKind::Variation => "variation",
            EntityKind::ConservedRegion => "conserved_region",
            EntityKind::ProteinFunctionPredictor => "protein_function_prediction",
            EntityKind::VariationPhenotypeAnnotation => "variation_phenotype_annotation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn target_table_follows_enum_order() {
        for (index, target) in BuildTarget::all().enumerate() {
            assert_eq!(target as usize, index);
            assert_eq!(target.as_str().parse::<BuildTarget>().unwrap(), target);
        }
    }

    #[test]
    fn parse_target_is_exact() {
        let err = "Gene".parse::<BuildTarget>().unwrap_err();
        assert_matches!(err, KiraError::InvalidTarget(_));
        let vpa: BuildTarget = "variation-phen-annot".parse().unwrap();
        assert_eq!(vpa, BuildTarget::VariationPhenotypeAnnotation);
    }

    #[test]
    fn clinvar_assembly_literals() {
        assert_eq!(
            "GRCh37".parse::<ClinvarAssembly>().unwrap(),
            ClinvarAssembly::Grch37
        );
        let err = "grch38".parse::<ClinvarAssembly>().unwrap_err();
        assert_matches!(err, KiraError::InvalidAssembly { .. });
    }
}
