//! Draws one assembled [`VisualState`] to the surface.
//!
//! Each loaded image is kept as an [`ImageGeneration`]: a layered texture
//! holding the sharp source at layer 0 and the blur pyramid keyframes above
//! it. The compositor mixes the two layers bracketing the current blur
//! fraction, applies duotone, dim, grain, and touch aberration in the
//! fragment shader, and crossfades the current generation over the previous
//! one with straight alpha blending.

use anyhow::Result;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::context::SurfaceContext;
use crate::pyramid::KeyframeSet;
use crate::types::{GenerationId, VisualState, MAX_TOUCH_POINTS};

const COMPOSITE_SHADER: &str = include_str!("../shaders/composite.wgsl");

/// Which two pyramid layers to sample and how far between them.
///
/// Layer 0 is the sharp image; layers `1..=keyframe_count` are the blur
/// keyframes in increasing radius order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendPlan {
    pub low: u32,
    pub high: u32,
    pub mix: f32,
}

/// Maps a blur fraction in `[0, 1]` onto the pyramid layers.
///
/// Progress is `fraction * keyframe_count`; the bracketing layers are its
/// floor and ceiling. With no keyframes the sharp layer is used alone,
/// whatever the fraction.
pub fn keyframe_blend(blur_fraction: f32, keyframe_count: usize) -> BlendPlan {
    if keyframe_count == 0 {
        return BlendPlan {
            low: 0,
            high: 0,
            mix: 0.0,
        };
    }
    let count = keyframe_count as f32;
    let progress = (blur_fraction.clamp(0.0, 1.0) * count).min(count);
    let low = progress.floor();
    let high = progress.ceil();
    BlendPlan {
        low: low as u32,
        high: high as u32,
        mix: progress - low,
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    resolution: [f32; 2],
    parallax: f32,
    dim: f32,
    duotone_light: [f32; 3],
    duotone_opacity: f32,
    duotone_dark: [f32; 3],
    layer_alpha: f32,
    blur_low: u32,
    blur_high: u32,
    blur_mix: f32,
    duotone_blend: u32,
    grain_enabled: u32,
    grain_amount: f32,
    grain_scale: f32,
    grain_seed: f32,
    touch_count: u32,
    duotone_always_on: u32,
    _pad: [u32; 2],
    touches: [[f32; 4]; MAX_TOUCH_POINTS],
}

/// GPU residency for one source image: the layered pyramid texture and its
/// bind group. Dropped wholesale when the generation is superseded.
pub struct ImageGeneration {
    pub id: GenerationId,
    keyframe_count: usize,
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl ImageGeneration {
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_count
    }
}

pub struct Compositor {
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniforms: wgpu::Buffer,
    frame_index: u64,
}

impl Compositor {
    pub fn new(context: &SurfaceContext) -> Self {
        let device = &context.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite bind layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite pipeline layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("composite pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: context.surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("composite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("composite uniforms"),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_layout,
            sampler,
            uniforms,
            frame_index: 0,
        }
    }

    /// Uploads a source image and its blur keyframes as one layered texture.
    ///
    /// Keyframes whose dimensions disagree with the source are skipped; the
    /// pyramid always upsamples back to the source size, so a mismatch means
    /// a stale result and the sharp layer alone is still valid.
    pub fn prepare_generation(
        &self,
        context: &SurfaceContext,
        id: GenerationId,
        source: &RgbaImage,
        keyframes: &KeyframeSet,
    ) -> Result<ImageGeneration> {
        let (width, height) = source.dimensions();
        anyhow::ensure!(width > 0 && height > 0, "source image is empty");

        let matching: Vec<&RgbaImage> = keyframes
            .frames()
            .iter()
            .map(|frame| &frame.image)
            .filter(|image| image.dimensions() == (width, height))
            .collect();
        let keyframe_count = matching.len();
        if keyframe_count != keyframes.len() {
            tracing::warn!(
                expected = keyframes.len(),
                usable = keyframe_count,
                "dropping blur keyframes with mismatched dimensions"
            );
        }

        let layer_count = (1 + keyframe_count) as u32;
        let mut data =
            Vec::with_capacity((width * height * 4) as usize * layer_count as usize);
        data.extend_from_slice(source.as_raw());
        for image in &matching {
            data.extend_from_slice(image.as_raw());
        }

        let device = &context.device;
        let texture = device.create_texture_with_data(
            &context.queue,
            &wgpu::TextureDescriptor {
                label: Some("image generation layers"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: layer_count,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("image generation view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("image generation bind group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniforms.as_entire_binding(),
                },
            ],
        });

        tracing::debug!(
            generation = id.0,
            layers = layer_count,
            width,
            height,
            "uploaded image generation"
        );

        Ok(ImageGeneration {
            id,
            keyframe_count,
            _texture: texture,
            bind_group,
        })
    }

    /// Draws one frame: previous generation underneath (when still fading),
    /// current generation on top at the crossfade alpha.
    pub fn render(
        &mut self,
        context: &SurfaceContext,
        state: &VisualState,
        current: &ImageGeneration,
        previous: Option<&ImageGeneration>,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("composite encoder"),
                });

        // The previous layer is skipped once the fade has fully settled.
        let underlay = previous.filter(|_| state.crossfade < 1.0);

        if let Some(prev) = underlay {
            self.encode_draw(context, &mut encoder, &view, state, prev, 1.0, true);
            self.encode_draw(
                context,
                &mut encoder,
                &view,
                state,
                current,
                state.crossfade,
                false,
            );
        } else {
            self.encode_draw(context, &mut encoder, &view, state, current, 1.0, true);
        }

        context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_draw(
        &self,
        context: &SurfaceContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        state: &VisualState,
        generation: &ImageGeneration,
        alpha: f32,
        clear: bool,
    ) {
        let uniforms = self.build_uniforms(context, state, generation, alpha);
        // Uniform contents differ per draw; each pass stages its own copy and
        // the encoder orders the copy before the pass.
        let staging = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("composite uniform staging"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.uniforms,
            0,
            std::mem::size_of::<CompositeUniforms>() as u64,
        );

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &generation.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn build_uniforms(
        &self,
        context: &SurfaceContext,
        state: &VisualState,
        generation: &ImageGeneration,
        alpha: f32,
    ) -> CompositeUniforms {
        let plan = keyframe_blend(state.blur, generation.keyframe_count);
        CompositeUniforms {
            resolution: [context.size.width as f32, context.size.height as f32],
            parallax: state.parallax,
            dim: state.dim,
            duotone_light: state.duotone_light.to_vec3(),
            duotone_opacity: state.duotone_opacity,
            duotone_dark: state.duotone_dark.to_vec3(),
            layer_alpha: alpha.clamp(0.0, 1.0),
            blur_low: plan.low,
            blur_high: plan.high,
            blur_mix: plan.mix,
            duotone_blend: state.duotone_blend.shader_index(),
            grain_enabled: state.grain.enabled as u32,
            grain_amount: state.grain.amount,
            grain_scale: state.grain.scale,
            grain_seed: (self.frame_index % 1024) as f32,
            touch_count: state.touches.count as u32,
            duotone_always_on: state.duotone_always_on as u32,
            _pad: [0; 2],
            touches: state.touches.points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_keyframes_pins_the_sharp_layer() {
        for fraction in [0.0, 0.5, 1.0] {
            let plan = keyframe_blend(fraction, 0);
            assert_eq!(plan, BlendPlan { low: 0, high: 0, mix: 0.0 });
        }
    }

    #[test]
    fn zero_fraction_is_the_sharp_layer() {
        let plan = keyframe_blend(0.0, 5);
        assert_eq!(plan.low, 0);
        assert_eq!(plan.high, 0);
        assert_eq!(plan.mix, 0.0);
    }

    #[test]
    fn full_fraction_is_the_last_keyframe() {
        let plan = keyframe_blend(1.0, 5);
        assert_eq!(plan.low, 5);
        assert_eq!(plan.high, 5);
        assert_eq!(plan.mix, 0.0);
    }

    #[test]
    fn midway_fraction_brackets_adjacent_layers() {
        // 0.5 * 5 keyframes = progress 2.5: halfway between layers 2 and 3.
        let plan = keyframe_blend(0.5, 5);
        assert_eq!(plan.low, 2);
        assert_eq!(plan.high, 3);
        assert!((plan.mix - 0.5).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_fractions_are_clamped() {
        assert_eq!(keyframe_blend(-0.2, 3), keyframe_blend(0.0, 3));
        assert_eq!(keyframe_blend(1.4, 3), keyframe_blend(1.0, 3));
    }

    #[test]
    fn uniform_struct_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 176);
    }
}
