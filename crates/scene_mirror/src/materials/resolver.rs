//! Material resolver
//!
//! Maps host shading groups onto renderer materials. Every supported surface
//! shader gets exactly one [`MaterialRecord`], shared by all the shading
//! groups it is connected to, and exactly one change subscription.
//!
//! Destroying a record is split in two. `detach_shading_group` hands the
//! record back once its last group is gone; the caller unbinds any meshes
//! still using the material and then calls `destroy_record`.

use std::collections::HashMap;

use crate::core::{MaterialConfig, SyncContext, SyncError, SyncResult};
use crate::host::{ExternalHandle, HostError, HostScene, ListenerKind, SubscriptionId};
use crate::materials::params::{
    Channel, ChannelValue, MaterialTextures, NormalizedShaderParams, ParamValue,
};
use crate::materials::shader_model::{
    roughness_from_cosine_power, ChannelSource, ShaderModel, ValueShape,
};
use crate::materials::texture_cache::TextureCache;
use crate::materials::upstream::find_upstream_texture;
use crate::render::{MaterialHandle, RenderBridge};

/// Renderer material built from one host surface shader
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    /// Host surface shader
    pub shader: ExternalHandle,
    /// Shading model of the shader
    pub model: ShaderModel,
    /// Renderer material
    pub material: MaterialHandle,
    /// Parameters last pushed to the renderer
    pub params: NormalizedShaderParams,
    /// Textures bound to the texture channels of `params`
    pub textures: MaterialTextures,
    /// Shading groups using this shader
    pub groups: Vec<ExternalHandle>,
    /// Change subscription on the shader
    pub subscription: SubscriptionId,
}

/// Shading group and shader bookkeeping
#[derive(Debug, Default)]
pub struct MaterialResolver {
    records: HashMap<ExternalHandle, MaterialRecord>,
    group_to_shader: HashMap<ExternalHandle, ExternalHandle>,
    textures: TextureCache,
}

impl MaterialResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the material of a shading group, creating it on first use
    ///
    /// A group already resolved to its current shader is left alone. A group
    /// resolved to a different shader must be detached by the caller first.
    pub fn resolve_shading_group(
        &mut self,
        ctx: &mut SyncContext<'_>,
        group: ExternalHandle,
    ) -> SyncResult<MaterialHandle> {
        let shader = ctx.host.surface_shader(group).ok_or_else(|| {
            SyncError::Skipped(format!("shading group {:?} has no surface shader", group))
        })?;

        if let Some(&current) = self.group_to_shader.get(&group) {
            if current != shader {
                crate::invariant_violation!(
                    "group {:?} resolved to {:?} while still attached to {:?}",
                    group,
                    shader,
                    current
                );
            }
            return self
                .records
                .get(&current)
                .map(|record| record.material)
                .ok_or_else(|| SyncError::Skipped(format!("group {:?} has no record", group)));
        }

        let type_name = ctx
            .host
            .type_name(shader)
            .ok_or(HostError::MissingObject(shader))?;
        let model = ShaderModel::from_type_name(&type_name);
        if !model.is_supported() {
            return Err(SyncError::Unsupported(format!(
                "shader {:?} of type '{}' on group {:?}",
                shader, type_name, group
            )));
        }

        if let Some(record) = self.records.get_mut(&shader) {
            record.groups.push(group);
            self.group_to_shader.insert(group, shader);
            log::debug!("Group {:?} shares material of shader {:?}", group, shader);
            return Ok(record.material);
        }

        let mut record = self.create_record(ctx, shader, model)?;
        let material = record.material;
        record.groups.push(group);
        self.records.insert(shader, record);
        self.group_to_shader.insert(group, shader);
        log::debug!("Created material {:?} for shader {:?} ({:?})", material, shader, model);
        Ok(material)
    }

    /// Read the normalized parameters of a shader without touching textures
    pub fn extract_parameters(
        host: &dyn HostScene,
        shader: ExternalHandle,
        model: ShaderModel,
        config: &MaterialConfig,
    ) -> NormalizedShaderParams {
        let mut params = NormalizedShaderParams::default();
        for channel in Channel::ALL {
            let Some(source) = model.source(channel) else {
                continue;
            };
            if let ChannelSource::Plug { plug, .. } = source {
                if let Some(path) = find_upstream_texture(host, shader, plug, config) {
                    params.set(channel, ChannelValue::Texture(path));
                    continue;
                }
            }
            if let Some(value) = read_constant(host, shader, source) {
                params.set(channel, ChannelValue::Constant(value));
            }
        }
        params
    }

    /// Push fresh parameters of a changed shader into its existing material
    ///
    /// The material handle is kept. New textures are acquired before the old
    /// ones are released so shared textures are never reloaded.
    pub fn on_shader_changed(
        &mut self,
        ctx: &mut SyncContext<'_>,
        shader: ExternalHandle,
    ) -> SyncResult<()> {
        let Some((model, material)) = self
            .records
            .get(&shader)
            .map(|record| (record.model, record.material))
        else {
            log::warn!("Change on untracked shader {:?} ignored", shader);
            return Ok(());
        };

        let mut params =
            Self::extract_parameters(&*ctx.host, shader, model, &ctx.config.materials);
        let textures = self.acquire_textures(ctx, shader, model, &mut params);

        if let Err(e) = ctx.renderer.update_material(material, &params, &textures) {
            self.release_textures(&mut *ctx.renderer, &params);
            return Err(e.into());
        }

        let old_params = match self.records.get_mut(&shader) {
            Some(record) => {
                record.textures = textures;
                std::mem::replace(&mut record.params, params)
            }
            None => return Ok(()),
        };
        self.release_textures(&mut *ctx.renderer, &old_params);
        log::debug!("Updated material of shader {:?}", shader);
        Ok(())
    }

    /// Forget a shading group
    ///
    /// Returns the record of its shader when this was the shader's last group;
    /// the caller must pass it to `destroy_record`.
    pub fn detach_shading_group(&mut self, group: ExternalHandle) -> Option<MaterialRecord> {
        let shader = self.group_to_shader.remove(&group)?;
        let Some(record) = self.records.get_mut(&shader) else {
            crate::invariant_violation!(
                "group {:?} mapped to shader {:?} without record",
                group,
                shader
            );
            return None;
        };
        record.groups.retain(|&g| g != group);
        log::debug!("Detached group {:?} from shader {:?}", group, shader);
        if record.groups.is_empty() {
            self.records.remove(&shader)
        } else {
            None
        }
    }

    /// Free everything a detached record owns
    ///
    /// No mesh may still be bound to the record's material.
    pub fn destroy_record(
        &mut self,
        ctx: &mut SyncContext<'_>,
        record: MaterialRecord,
    ) -> SyncResult<()> {
        ctx.callbacks.unregister(&mut *ctx.host, record.subscription);
        ctx.renderer.wait_for_gpu_idle();
        let destroyed = ctx.renderer.destroy_material(record.material);
        self.release_textures(&mut *ctx.renderer, &record.params);
        log::debug!("Destroyed material of shader {:?}", record.shader);
        destroyed.map_err(SyncError::from)
    }

    /// Shader a group is attached to
    pub fn shader_of(&self, group: ExternalHandle) -> Option<ExternalHandle> {
        self.group_to_shader.get(&group).copied()
    }

    /// Material of a resolved group
    pub fn material_of_group(&self, group: ExternalHandle) -> Option<MaterialHandle> {
        self.shader_of(group)
            .and_then(|shader| self.records.get(&shader))
            .map(|record| record.material)
    }

    /// Groups attached to a shader, copied
    pub fn groups_of_shader(&self, shader: ExternalHandle) -> Vec<ExternalHandle> {
        self.records
            .get(&shader)
            .map(|record| record.groups.clone())
            .unwrap_or_default()
    }

    /// Record of a shader
    pub fn record(&self, shader: ExternalHandle) -> Option<&MaterialRecord> {
        self.records.get(&shader)
    }

    /// Whether `shader` has a record
    pub fn tracks_shader(&self, shader: ExternalHandle) -> bool {
        self.records.contains_key(&shader)
    }

    /// Whether `group` is resolved
    pub fn tracks_group(&self, group: ExternalHandle) -> bool {
        self.group_to_shader.contains_key(&group)
    }

    /// All resolved groups, copied
    pub fn groups(&self) -> Vec<ExternalHandle> {
        self.group_to_shader.keys().copied().collect()
    }

    /// Number of material records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No material records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct textures held
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Reference count of a texture path
    pub fn texture_refcount(&self, path: &str) -> usize {
        self.textures.refcount(path)
    }

    /// Free any texture still cached
    pub fn release_all_textures(&mut self, renderer: &mut dyn RenderBridge) {
        self.textures.release_all(renderer);
    }

    fn create_record(
        &mut self,
        ctx: &mut SyncContext<'_>,
        shader: ExternalHandle,
        model: ShaderModel,
    ) -> SyncResult<MaterialRecord> {
        let mut params =
            Self::extract_parameters(&*ctx.host, shader, model, &ctx.config.materials);
        let textures = self.acquire_textures(ctx, shader, model, &mut params);

        let material = match ctx.renderer.create_material(&params, &textures) {
            Ok(material) => material,
            Err(e) => {
                self.release_textures(&mut *ctx.renderer, &params);
                return Err(e.into());
            }
        };

        let subscription = match ctx.callbacks.subscribe(
            &mut *ctx.host,
            Some(shader),
            ListenerKind::AttributeChanged,
        ) {
            Ok(subscription) => subscription,
            Err(e) => {
                ctx.renderer.wait_for_gpu_idle();
                if let Err(destroy_error) = ctx.renderer.destroy_material(material) {
                    log::warn!("Failed to destroy material {:?}: {}", material, destroy_error);
                }
                self.release_textures(&mut *ctx.renderer, &params);
                return Err(e.into());
            }
        };

        Ok(MaterialRecord {
            shader,
            model,
            material,
            params,
            textures,
            groups: Vec::new(),
            subscription,
        })
    }

    /// Acquire every texture `params` references
    ///
    /// A texture that fails to load is replaced by the shader's constant for
    /// that channel.
    fn acquire_textures(
        &mut self,
        ctx: &mut SyncContext<'_>,
        shader: ExternalHandle,
        model: ShaderModel,
        params: &mut NormalizedShaderParams,
    ) -> MaterialTextures {
        let bindings: Vec<(Channel, String)> = params
            .texture_bindings()
            .map(|(channel, path)| (channel, path.to_string()))
            .collect();

        let mut textures = MaterialTextures::new();
        for (channel, path) in bindings {
            match self.textures.acquire(&mut *ctx.renderer, &path) {
                Ok(handle) => textures.set(channel, Some(handle)),
                Err(e) => {
                    log::warn!(
                        "Texture '{}' for {:?} of shader {:?} unavailable: {}",
                        path,
                        channel,
                        shader,
                        e
                    );
                    let fallback = model
                        .source(channel)
                        .and_then(|source| read_constant(&*ctx.host, shader, source))
                        .unwrap_or_else(|| {
                            NormalizedShaderParams::default()
                                .get(channel)
                                .constant()
                                .unwrap_or(ParamValue::Scalar(0.0))
                        });
                    params.set(channel, ChannelValue::Constant(fallback));
                }
            }
        }
        textures
    }

    fn release_textures(
        &mut self,
        renderer: &mut dyn RenderBridge,
        params: &NormalizedShaderParams,
    ) {
        for (_, path) in params.texture_bindings() {
            if let Err(e) = self.textures.release(renderer, path) {
                log::warn!("Failed to release texture '{}': {}", path, e);
            }
        }
    }
}

/// Constant value of a channel source, `None` when the shader lacks the plug
fn read_constant(
    host: &dyn HostScene,
    shader: ExternalHandle,
    source: ChannelSource,
) -> Option<ParamValue> {
    let read = |plug: &str| match host.plug_value(shader, plug) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Using default for '{}' on {:?}: {}", plug, shader, e);
            None
        }
    };

    match source {
        ChannelSource::Fixed(value) => Some(value),
        ChannelSource::Plug { plug, shape: ValueShape::Color } => {
            read(plug)?.as_color().map(ParamValue::Color)
        }
        ChannelSource::Plug { plug, shape: ValueShape::Scalar } => {
            read(plug)?.as_float().map(ParamValue::Scalar)
        }
        ChannelSource::CosinePower { plug } => read(plug)?
            .as_float()
            .map(|power| ParamValue::Scalar(roughness_from_cosine_power(power))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::CallbackRegistry;
    use crate::core::SyncConfig;
    use crate::host::memory::{MemoryHost, SURFACE_SHADER_PLUG};
    use crate::host::PlugValue;
    use crate::render::HeadlessRenderer;
    use approx::assert_relative_eq;

    struct Fixture {
        host: MemoryHost,
        renderer: HeadlessRenderer,
        callbacks: CallbackRegistry,
        config: SyncConfig,
        resolver: MaterialResolver,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                host: MemoryHost::new(),
                renderer: HeadlessRenderer::new(),
                callbacks: CallbackRegistry::new(),
                config: SyncConfig::default(),
                resolver: MaterialResolver::new(),
            }
        }

        fn resolve(&mut self, group: ExternalHandle) -> SyncResult<MaterialHandle> {
            let mut ctx = SyncContext {
                host: &mut self.host,
                renderer: &mut self.renderer,
                callbacks: &mut self.callbacks,
                config: &self.config,
            };
            self.resolver.resolve_shading_group(&mut ctx, group)
        }

        fn shader_changed(&mut self, shader: ExternalHandle) -> SyncResult<()> {
            let mut ctx = SyncContext {
                host: &mut self.host,
                renderer: &mut self.renderer,
                callbacks: &mut self.callbacks,
                config: &self.config,
            };
            self.resolver.on_shader_changed(&mut ctx, shader)
        }

        fn detach(&mut self, group: ExternalHandle) {
            if let Some(record) = self.resolver.detach_shading_group(group) {
                let mut ctx = SyncContext {
                    host: &mut self.host,
                    renderer: &mut self.renderer,
                    callbacks: &mut self.callbacks,
                    config: &self.config,
                };
                self.resolver.destroy_record(&mut ctx, record).unwrap();
            }
        }

        fn group_with(&mut self, shader: ExternalHandle) -> ExternalHandle {
            let group = self.host.add_shading_group();
            self.host.connect(shader, group, SURFACE_SHADER_PLUG);
            group
        }
    }

    #[test]
    fn test_arnold_base_color_texture() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("aiStandardSurface");
        f.host.set_plug(shader, "baseColor", PlugValue::Color([0.2, 0.3, 0.4]));
        f.host.set_plug(shader, "specularRoughness", PlugValue::Float(0.35));
        f.host.set_plug(shader, "metalness", PlugValue::Float(0.9));
        let file = f.host.add_file_texture("textures/brick.png");
        f.host.connect(file, shader, "baseColor");
        let group = f.group_with(shader);

        f.resolve(group).unwrap();

        let record = f.resolver.record(shader).unwrap();
        assert_eq!(
            record.params.albedo(),
            &ChannelValue::Texture("textures/brick.png".to_string())
        );
        assert_eq!(record.params.roughness(), &ChannelValue::Constant(ParamValue::Scalar(0.35)));
        assert_eq!(record.params.metalness(), &ChannelValue::Constant(ParamValue::Scalar(0.9)));
        assert!(record.textures.get(Channel::Albedo).is_some());
        assert_eq!(f.resolver.texture_refcount("textures/brick.png"), 1);
    }

    #[test]
    fn test_two_groups_share_one_record() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("lambert");
        let first = f.group_with(shader);
        let second = f.group_with(shader);

        let a = f.resolve(first).unwrap();
        let b = f.resolve(second).unwrap();

        assert_eq!(a, b);
        assert_eq!(f.resolver.len(), 1);
        assert_eq!(f.resolver.groups_of_shader(shader), vec![first, second]);
        assert_eq!(f.callbacks.len(), 1);
        assert_eq!(f.renderer.material_count(), 1);
    }

    #[test]
    fn test_unsupported_shader_creates_nothing() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("blinn");
        let group = f.group_with(shader);

        assert!(matches!(f.resolve(group), Err(SyncError::Unsupported(_))));
        assert!(f.resolver.is_empty());
        assert!(f.callbacks.is_empty());
    }

    #[test]
    fn test_group_without_shader_is_skipped() {
        let mut f = Fixture::new();
        let group = f.host.add_shading_group();
        assert!(matches!(f.resolve(group), Err(SyncError::Skipped(_))));
    }

    #[test]
    fn test_phong_roughness_from_cosine_power() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("phong");
        f.host.set_plug(shader, "cosinePower", PlugValue::Float(6.0));
        let group = f.group_with(shader);
        f.resolve(group).unwrap();

        let record = f.resolver.record(shader).unwrap();
        match record.params.roughness() {
            ChannelValue::Constant(ParamValue::Scalar(value)) => assert_relative_eq!(*value, 0.5),
            other => panic!("unexpected roughness {:?}", other),
        }
        assert_eq!(record.params.metalness(), &ChannelValue::Constant(ParamValue::Scalar(0.0)));
    }

    #[test]
    fn test_shader_change_updates_in_place() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("lambert");
        f.host.set_plug(shader, "color", PlugValue::Color([1.0, 0.0, 0.0]));
        let group = f.group_with(shader);
        let material = f.resolve(group).unwrap();

        f.host.set_plug(shader, "color", PlugValue::Color([0.0, 1.0, 0.0]));
        f.shader_changed(shader).unwrap();

        let record = f.resolver.record(shader).unwrap();
        assert_eq!(record.material, material);
        assert_eq!(
            f.renderer.material(material).unwrap().params.albedo(),
            &ChannelValue::Constant(ParamValue::Color([0.0, 1.0, 0.0]))
        );
        assert_eq!(f.renderer.material_count(), 1);
    }

    #[test]
    fn test_shader_change_swaps_textures() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("lambert");
        let old = f.host.add_file_texture("old.png");
        f.host.connect(old, shader, "color");
        let group = f.group_with(shader);
        f.resolve(group).unwrap();

        let new = f.host.add_file_texture("new.png");
        f.host.connect(new, shader, "color");
        f.shader_changed(shader).unwrap();

        assert_eq!(f.resolver.texture_refcount("old.png"), 0);
        assert_eq!(f.resolver.texture_refcount("new.png"), 1);
        assert_eq!(f.renderer.texture_count(), 1);
        assert!(f.renderer.destroys_are_fenced());
    }

    #[test]
    fn test_missing_texture_falls_back_to_constant() {
        let mut f = Fixture::new();
        f.renderer.fail_texture("gone.png");
        let shader = f.host.add_shader("lambert");
        f.host.set_plug(shader, "color", PlugValue::Color([0.5, 0.5, 0.5]));
        let file = f.host.add_file_texture("gone.png");
        f.host.connect(file, shader, "color");
        let group = f.group_with(shader);

        f.resolve(group).unwrap();

        let record = f.resolver.record(shader).unwrap();
        assert_eq!(
            record.params.albedo(),
            &ChannelValue::Constant(ParamValue::Color([0.5, 0.5, 0.5]))
        );
        assert!(!record.textures.has_any_textures());
    }

    #[test]
    fn test_last_detach_destroys_record() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("aiStandardSurface");
        let file = f.host.add_file_texture("albedo.png");
        f.host.connect(file, shader, "baseColor");
        let first = f.group_with(shader);
        let second = f.group_with(shader);
        f.resolve(first).unwrap();
        f.resolve(second).unwrap();

        f.detach(first);
        assert_eq!(f.resolver.len(), 1);
        assert_eq!(f.callbacks.len(), 1);

        f.detach(second);
        assert!(f.resolver.is_empty());
        assert!(f.callbacks.is_empty());
        assert_eq!(f.renderer.material_count(), 0);
        assert_eq!(f.renderer.texture_count(), 0);
        assert!(f.renderer.destroys_are_fenced());
    }

    #[test]
    fn test_change_on_untracked_shader_is_noop() {
        let mut f = Fixture::new();
        let shader = f.host.add_shader("lambert");
        assert!(f.shader_changed(shader).is_ok());
        assert_eq!(f.renderer.material_count(), 0);
    }
}
