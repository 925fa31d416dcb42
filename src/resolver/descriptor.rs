//! Fully resolved block-state descriptors.
//!
//! Every model reference in a block state is replaced by a [`ResolvedModel`]
//! whose texture variables point straight at atlas tiles.

use super::face_uv::face_uv;
use super::model_resolver::{resolve_texture_reference, FlattenedModel, ModelResolver};
use crate::atlas::{TextureAtlas, UvRect, MISSING_TEXTURE};
use crate::error::Result;
use crate::resource_pack::{ExtractedBlockState, ExtractedModel, ModelVariant, MultipartCondition};
use crate::types::{Direction, ElementRotation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Block name to its resolved descriptor.
pub type ResolvedBlockStates = BTreeMap<String, ResolvedBlockState>;

/// An atlas tile plus the tile centre used to clamp mip sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTexture {
    #[serde(flatten)]
    pub uv: UvRect,
    pub bu: f32,
    pub bv: f32,
}

impl ResolvedTexture {
    fn from_rect(rect: &UvRect) -> Self {
        let [bu, bv] = rect.center();
        Self {
            uv: rect.clone(),
            bu,
            bv,
        }
    }
}

/// One face of a resolved element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFace {
    /// `[u1, v1, u2, v2]` as a fraction of the tile.
    pub uv: [f32; 4],
    /// Key into the owning model's `textures`.
    pub texture: String,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cullface: Option<Direction>,
    #[serde(default = "no_tint")]
    pub tintindex: i32,
}

fn no_tint() -> i32 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedElement {
    pub from: [f32; 3],
    pub to: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<ElementRotation>,
    pub shade: bool,
    pub faces: BTreeMap<Direction, ResolvedFace>,
}

/// A model with inheritance flattened and textures bound to the atlas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedModel {
    pub textures: BTreeMap<String, ResolvedTexture>,
    pub elements: Vec<ResolvedElement>,
    pub ambient_occlusion: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedVariant {
    pub model: ResolvedModel,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub uvlock: bool,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMultipartCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<MultipartCondition>,
    pub apply: Vec<ResolvedVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBlockState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<BTreeMap<String, Vec<ResolvedVariant>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipart: Option<Vec<ResolvedMultipartCase>>,
}

/// Builds [`ResolvedBlockStates`] from extracted content and a built atlas.
pub struct DescriptorBuilder<'a> {
    models: ModelResolver<'a>,
    atlas: &'a TextureAtlas,
    resolved: HashMap<String, ResolvedModel>,
    missing_model_refs: usize,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(models: &'a [ExtractedModel], atlas: &'a TextureAtlas) -> Self {
        Self {
            models: ModelResolver::new(models),
            atlas,
            resolved: HashMap::new(),
            missing_model_refs: 0,
        }
    }

    /// Resolve every block state.
    ///
    /// Fails only on a cyclic parent chain; unknown models become a
    /// missing-texture cube.
    pub fn build(mut self, block_states: &[ExtractedBlockState]) -> Result<ResolvedBlockStates> {
        let mut output = ResolvedBlockStates::new();

        for state in block_states {
            let definition = &state.definition;

            let variants = match &definition.variants {
                Some(variants) => {
                    let mut resolved = BTreeMap::new();
                    for (key, options) in variants {
                        resolved.insert(key.clone(), self.resolve_variants(options.iter())?);
                    }
                    Some(resolved)
                }
                None => None,
            };

            let multipart = match &definition.multipart {
                Some(cases) => {
                    let mut resolved = Vec::with_capacity(cases.len());
                    for case in cases {
                        resolved.push(ResolvedMultipartCase {
                            when: case.when.clone(),
                            apply: self.resolve_variants(case.apply.variants().into_iter())?,
                        });
                    }
                    Some(resolved)
                }
                None => None,
            };

            output.insert(state.name.clone(), ResolvedBlockState { variants, multipart });
        }

        if self.missing_model_refs > 0 {
            tracing::warn!(
                count = self.missing_model_refs,
                "model references not found, substituted missing-texture cube"
            );
        }
        tracing::info!(
            block_states = output.len(),
            models = self.resolved.len(),
            "block descriptors resolved"
        );

        Ok(output)
    }

    fn resolve_variants<'v>(
        &mut self,
        variants: impl Iterator<Item = &'v ModelVariant>,
    ) -> Result<Vec<ResolvedVariant>> {
        variants
            .map(|variant| {
                Ok(ResolvedVariant {
                    model: self.resolve_model(&variant.model)?,
                    x: variant.x,
                    y: variant.y,
                    uvlock: variant.uvlock,
                    weight: variant.weight,
                })
            })
            .collect()
    }

    /// Resolve one model reference, memoized by name.
    pub fn resolve_model(&mut self, reference: &str) -> Result<ResolvedModel> {
        if let Some(model) = self.resolved.get(reference) {
            return Ok(model.clone());
        }

        let model = match self.models.resolve(reference)? {
            Some(flattened) => self.bind_textures(&flattened),
            None => {
                tracing::debug!(model = %reference, "unknown model reference");
                self.missing_model_refs += 1;
                self.missing_cube()
            }
        };

        self.resolved.insert(reference.to_string(), model.clone());
        Ok(model)
    }

    fn texture_for(&self, concrete: Option<&str>) -> ResolvedTexture {
        let rect = match concrete {
            Some(name) => self.atlas.region_or_missing(name),
            None => self.atlas.region_or_missing(MISSING_TEXTURE),
        };
        ResolvedTexture::from_rect(rect)
    }

    fn bind_textures(&self, model: &FlattenedModel) -> ResolvedModel {
        let mut textures: BTreeMap<String, ResolvedTexture> = model
            .textures
            .keys()
            .map(|key| {
                let reference = format!("#{}", key);
                let concrete = resolve_texture_reference(&reference, &model.textures);
                (key.clone(), self.texture_for(concrete.as_deref()))
            })
            .collect();

        let elements = model
            .elements
            .iter()
            .map(|element| {
                let faces = element
                    .faces
                    .iter()
                    .map(|(&direction, face)| {
                        let key = match face.texture.strip_prefix('#') {
                            Some(variable) => variable.to_string(),
                            None => face.texture.clone(),
                        };
                        if !textures.contains_key(&key) {
                            let concrete = resolve_texture_reference(&face.texture, &model.textures);
                            textures.insert(key.clone(), self.texture_for(concrete.as_deref()));
                        }
                        let resolved = ResolvedFace {
                            uv: face_uv(direction, face.uv, element.from, element.to),
                            texture: key,
                            rotation: face.rotation,
                            cullface: face.cullface,
                            tintindex: face.tintindex,
                        };
                        (direction, resolved)
                    })
                    .collect();

                ResolvedElement {
                    from: element.from,
                    to: element.to,
                    rotation: element.rotation.clone(),
                    shade: element.shade,
                    faces,
                }
            })
            .collect();

        ResolvedModel {
            textures,
            elements,
            ambient_occlusion: model.ambient_occlusion,
        }
    }

    /// A full cube with every face on the missing-texture tile.
    fn missing_cube(&self) -> ResolvedModel {
        let from = [0.0, 0.0, 0.0];
        let to = [16.0, 16.0, 16.0];
        let faces = Direction::ALL
            .iter()
            .map(|&direction| {
                (
                    direction,
                    ResolvedFace {
                        uv: face_uv(direction, None, from, to),
                        texture: MISSING_TEXTURE.to_string(),
                        rotation: 0,
                        cullface: Some(direction),
                        tintindex: -1,
                    },
                )
            })
            .collect();

        ResolvedModel {
            textures: [(MISSING_TEXTURE.to_string(), self.texture_for(None))]
                .into_iter()
                .collect(),
            elements: vec![ResolvedElement {
                from,
                to,
                rotation: None,
                shade: true,
                faces,
            }],
            ambient_occlusion: true,
        }
    }
}
