use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RegistryConfig;
pub use crate::domain::AdaptorKey;
use crate::domain::{EntityKind, Species, SpeciesCatalog};
use crate::error::KiraError;

/// Read access to one entity category for one species and assembly.
pub trait Adaptor: Send + Sync {
    fn kind(&self) -> EntityKind;
    fn key(&self) -> &AdaptorKey;
    fn count(&self) -> Result<usize, KiraError>;
    fn get_by_id(&self, id: &str) -> Result<Vec<Value>, KiraError>;
    fn get_all(&self, limit: Option<usize>) -> Result<Vec<Value>, KiraError>;
}

/// An open session on the backing store for a single key.
pub trait Connection: Send + Sync {
    fn adaptor(&self, kind: EntityKind) -> Result<Arc<dyn Adaptor>, KiraError>;
    fn close(&self);
}

pub trait StorageBackend: Send + Sync {
    fn connect(
        &self,
        config: &RegistryConfig,
        species: &Species,
        key: &AdaptorKey,
    ) -> Result<Arc<dyn Connection>, KiraError>;
}

/// Resolves and caches entity adaptors per species and assembly.
///
/// Lifecycle: `set_configuration`, then `open` each key that will be served,
/// then any number of concurrent lookups, then `close`. Adaptors handed out
/// stay usable only until `close`.
pub struct AdaptorRegistry<B: StorageBackend> {
    catalog: SpeciesCatalog,
    backend: B,
    config: Option<RegistryConfig>,
    connections: DashMap<AdaptorKey, Arc<dyn Connection>>,
    adaptors: DashMap<(AdaptorKey, EntityKind), Arc<dyn Adaptor>>,
}

impl<B: StorageBackend> AdaptorRegistry<B> {
    pub fn new(catalog: SpeciesCatalog, backend: B) -> Self {
        Self {
            catalog,
            backend,
            config: None,
            connections: DashMap::new(),
            adaptors: DashMap::new(),
        }
    }

    pub fn set_configuration(&mut self, config: RegistryConfig) {
        self.config = Some(config);
    }

    pub fn configuration(&self) -> Option<&RegistryConfig> {
        self.config.as_ref()
    }

    /// Connects the backing store for a key. Opening an already open key is a
    /// no-op.
    pub fn open(&self, species: &str, assembly: Option<&str>) -> Result<(), KiraError> {
        let config = self.config.as_ref().ok_or(KiraError::RegistryNotConfigured)?;
        let (sp, key) = self
            .key_for(species, assembly)
            .ok_or_else(|| KiraError::UnknownSpecies(species.to_string()))?;

        self.connections
            .entry(key.clone())
            .or_try_insert_with(|| {
                info!(key = %key, "opening adaptor store");
                self.backend.connect(config, sp, &key)
            })?;
        Ok(())
    }

    /// Closes every open key and forgets every cached adaptor.
    pub fn close(&self) {
        self.adaptors.clear();
        for connection in self.connections.iter() {
            debug!(key = %connection.key(), "closing adaptor store");
            connection.value().close();
        }
        self.connections.clear();
    }

    pub fn is_open(&self, species: &str, assembly: Option<&str>) -> bool {
        self.key_for(species, assembly)
            .map(|(_, key)| self.connections.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn open_keys(&self) -> Vec<AdaptorKey> {
        let mut keys = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }

    /// Looks up the adaptor for `kind`, building it on first use. Concurrent
    /// first lookups of the same key and kind construct it once.
    pub fn resolve(
        &self,
        kind: EntityKind,
        species: &str,
        assembly: Option<&str>,
    ) -> Result<Arc<dyn Adaptor>, KiraError> {
        let not_initialized = || KiraError::RegistryNotInitialized {
            species: species.to_string(),
            assembly: assembly.unwrap_or("default").to_string(),
        };
        let (_, key) = self.key_for(species, assembly).ok_or_else(not_initialized)?;
        let connection = self
            .connections
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(not_initialized)?;

        let adaptor = self
            .adaptors
            .entry((key, kind))
            .or_try_insert_with(|| {
                debug!(kind = %kind, "creating adaptor");
                connection.adaptor(kind)
            })?;
        Ok(Arc::clone(adaptor.value()))
    }

    fn key_for(&self, species: &str, assembly: Option<&str>) -> Option<(&Species, AdaptorKey)> {
        self.catalog.adaptor_key(species, assembly)
    }
}

macro_rules! entity_adaptors {
    ($($kind:ident => $handle:ident, $get:ident, $get_for:ident;)*) => {
        $(
            #[doc = concat!("Typed handle on the `", stringify!($kind), "` adaptor.")]
            #[derive(Clone)]
            pub struct $handle(Arc<dyn Adaptor>);

            impl $handle {
                pub fn inner(&self) -> &Arc<dyn Adaptor> {
                    &self.0
                }
            }

            impl Deref for $handle {
                type Target = dyn Adaptor;

                fn deref(&self) -> &Self::Target {
                    self.0.as_ref()
                }
            }

            impl fmt::Debug for $handle {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($handle)).field(self.0.key()).finish()
                }
            }
        )*

        impl<B: StorageBackend> AdaptorRegistry<B> {
            $(
                #[doc = concat!("`", stringify!($kind), "` adaptor on the species' default assembly.")]
                pub fn $get(&self, species: &str) -> Result<$handle, KiraError> {
                    self.resolve(EntityKind::$kind, species, None).map($handle)
                }

                pub fn $get_for(&self, species: &str, assembly: &str) -> Result<$handle, KiraError> {
                    self.resolve(EntityKind::$kind, species, Some(assembly)).map($handle)
                }
            )*
        }
    };
}

entity_adaptors! {
    Gene => GeneAdaptor, gene_adaptor, gene_adaptor_for;
    Transcript => TranscriptAdaptor, transcript_adaptor, transcript_adaptor_for;
    Chromosome => ChromosomeAdaptor, chromosome_adaptor, chromosome_adaptor_for;
    Exon => ExonAdaptor, exon_adaptor, exon_adaptor_for;
    VariantEffect => VariantEffectAdaptor, variant_effect_adaptor, variant_effect_adaptor_for;
    VariantAnnotation => VariantAnnotationAdaptor, variant_annotation_adaptor, variant_annotation_adaptor_for;
    Protein => ProteinAdaptor, protein_adaptor, protein_adaptor_for;
    Snp => SnpAdaptor, snp_adaptor, snp_adaptor_for;
    GenomeSequence => GenomeSequenceAdaptor, genome_sequence_adaptor, genome_sequence_adaptor_for;
    Cytoband => CytobandAdaptor, cytoband_adaptor, cytoband_adaptor_for;
    Xref => XrefAdaptor, xref_adaptor, xref_adaptor_for;
    Tfbs => TfbsAdaptor, tfbs_adaptor, tfbs_adaptor_for;
    RegulatoryRegion => RegulatoryRegionAdaptor, regulatory_region_adaptor, regulatory_region_adaptor_for;
    Mirna => MirnaAdaptor, mirna_adaptor, mirna_adaptor_for;
    Mutation => MutationAdaptor, mutation_adaptor, mutation_adaptor_for;
    Clinvar => ClinvarAdaptor, clinvar_adaptor, clinvar_adaptor_for;
    Clinical => ClinicalAdaptor, clinical_adaptor, clinical_adaptor_for;
    CpgIsland => CpgIslandAdaptor, cpg_island_adaptor, cpg_island_adaptor_for;
    StructuralVariation => StructuralVariationAdaptor, structural_variation_adaptor, structural_variation_adaptor_for;
    Pathway => PathwayAdaptor, pathway_adaptor, pathway_adaptor_for;
    ProteinProteinInteraction => ProteinProteinInteractionAdaptor, protein_protein_interaction_adaptor, protein_protein_interaction_adaptor_for;
    Variation => VariationAdaptor, variation_adaptor, variation_adaptor_for;
    ConservedRegion => ConservedRegionAdaptor, conserved_region_adaptor, conserved_region_adaptor_for;
    ProteinFunctionPredictor => ProteinFunctionPredictorAdaptor, protein_function_predictor_adaptor, protein_function_predictor_adaptor_for;
    VariationPhenotypeAnnotation => VariationPhenotypeAnnotationAdaptor, variation_phenotype_annotation_adaptor, variation_phenotype_annotation_adaptor_for;
}
