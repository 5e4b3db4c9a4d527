//! Windowed engine host: event loop, pyramid worker, and redraw scheduling.
//!
//! The render thread owns the synthesizer and the compositor. Blur pyramid
//! generation runs on a dedicated worker thread with its own off-screen GPU
//! device; finished pyramids come back as CPU rasters through a latest-wins
//! slot and are uploaded to the render device here. Redraws are demand
//! driven: the loop requests another frame only while the synthesizer
//! reports live animation.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context as AnyhowContext, Result};
use image::RgbaImage;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::compositor::{Compositor, ImageGeneration};
use crate::context::SurfaceContext;
use crate::handoff::{latest_slot, LatestConsumer, LatestPublisher};
use crate::pyramid::{KeyframeSet, PyramidGenerator};
use crate::synth::StateSynthesizer;
use crate::touch::{TouchEvent, TouchPhase};
use crate::types::{GenerationId, TargetState};

/// Where the engine gets the next wallpaper image from.
///
/// Implementations decide ordering and repetition; returning `None` leaves
/// the current image on screen until the next rotation deadline.
pub trait ImageSource: Send {
    fn next(&mut self) -> Option<PathBuf>;
}

/// Host configuration assembled by the caller from settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub surface_size: (u32, u32),
    /// Initial effect targets; later changes arrive via the same struct.
    pub effects: TargetState,
    /// Easing duration for property and crossfade transitions.
    pub transition: Duration,
    /// Largest blur radius the pyramid is built for, in source pixels.
    pub max_blur_radius: f32,
    /// How long each image stays before the next one is requested.
    pub rotation_interval: Duration,
}

struct PyramidRequest {
    generation: GenerationId,
    path: PathBuf,
    max_radius: f32,
}

struct PyramidResult {
    generation: GenerationId,
    image: RgbaImage,
    keyframes: KeyframeSet,
}

/// Worker loop: drains the request queue to the most recent entry, loads the
/// image, and builds its pyramid. Superseded requests are never processed.
fn pyramid_worker(
    requests: crossbeam_channel::Receiver<PyramidRequest>,
    results: LatestPublisher<PyramidResult>,
) {
    let mut generator = PyramidGenerator::new();
    while let Ok(mut request) = requests.recv() {
        while let Ok(newer) = requests.try_recv() {
            debug!(
                superseded = request.generation.0,
                by = newer.generation.0,
                "skipping superseded pyramid request"
            );
            request = newer;
        }

        let image = match image::open(&request.path) {
            Ok(image) => image.to_rgba8(),
            Err(err) => {
                warn!(
                    path = %request.path.display(),
                    error = %err,
                    "failed to load image; keeping current wallpaper"
                );
                continue;
            }
        };

        let started = Instant::now();
        let keyframes = generator.generate(&image, request.max_radius);
        debug!(
            generation = request.generation.0,
            keyframes = keyframes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pyramid ready"
        );
        results.publish(PyramidResult {
            generation: request.generation,
            image,
            keyframes,
        });
    }
}

/// Drops a finished pyramid whose generation is no longer the latest one
/// requested. The worker already skips superseded *requests*, but a result
/// published just before a newer request was sent would otherwise still be
/// applied and run a spurious extra crossfade.
fn filter_superseded(
    result: Option<PyramidResult>,
    latest: GenerationId,
) -> Option<PyramidResult> {
    match result {
        Some(result) if result.generation != latest => {
            debug!(
                superseded = result.generation.0,
                latest = latest.0,
                "discarding superseded pyramid result"
            );
            None
        }
        other => other,
    }
}

/// Runs the engine until the window closes.
pub fn run(config: EngineConfig, mut source: Box<dyn ImageSource>) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title("driftpaper")
        .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
        .build(&event_loop)
        .context("failed to create window")?;

    let mut context = SurfaceContext::new(&window, window.inner_size())?;
    let mut compositor = Compositor::new(&context);
    let mut synth = StateSynthesizer::new(config.effects);
    synth.set_duration(config.transition);

    let (request_tx, request_rx) = crossbeam_channel::unbounded::<PyramidRequest>();
    let (result_tx, result_rx): (_, LatestConsumer<PyramidResult>) = latest_slot();
    thread::Builder::new()
        .name("pyramid-worker".into())
        .spawn(move || pyramid_worker(request_rx, result_tx))
        .context("failed to spawn pyramid worker")?;

    let mut current: Option<ImageGeneration> = None;
    let mut previous: Option<ImageGeneration> = None;
    let mut generation = config.effects.generation;
    let mut pending_touches: Vec<TouchEvent> = Vec::new();
    let mut pointer_pos = (0.5f32, 0.5f32);
    let mut pointer_down = false;
    let mut next_rotation = Instant::now();
    let max_blur_radius = config.max_blur_radius.max(0.0);
    let rotation_interval = config.rotation_interval.max(Duration::from_secs(1));

    info!(
        rotation_secs = rotation_interval.as_secs(),
        max_blur_radius, "engine starting"
    );

    event_loop
        .run(move |event, elwt| {
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(new_size) => {
                        context.resize(new_size);
                        window.request_redraw();
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let w = context.size.width.max(1) as f32;
                        let h = context.size.height.max(1) as f32;
                        pointer_pos = (
                            (position.x as f32 / w).clamp(0.0, 1.0),
                            (position.y as f32 / h).clamp(0.0, 1.0),
                        );

                        // The horizontal pointer position chases the
                        // parallax target.
                        let mut target = *synth.target();
                        target.parallax = pointer_pos.0;
                        synth.update_target(target, Instant::now());

                        if pointer_down {
                            pending_touches.push(TouchEvent {
                                id: 0,
                                x: pointer_pos.0,
                                y: pointer_pos.1,
                                phase: TouchPhase::Move,
                            });
                        }
                        window.request_redraw();
                    }
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        pointer_down = state == ElementState::Pressed;
                        pending_touches.push(TouchEvent {
                            id: 0,
                            x: pointer_pos.0,
                            y: pointer_pos.1,
                            phase: if pointer_down {
                                TouchPhase::Down
                            } else {
                                TouchPhase::Up
                            },
                        });
                        window.request_redraw();
                    }
                    WindowEvent::Touch(touch) => {
                        let w = context.size.width.max(1) as f32;
                        let h = context.size.height.max(1) as f32;
                        let phase = match touch.phase {
                            winit::event::TouchPhase::Started => TouchPhase::Down,
                            winit::event::TouchPhase::Moved => TouchPhase::Move,
                            winit::event::TouchPhase::Ended
                            | winit::event::TouchPhase::Cancelled => TouchPhase::Up,
                        };
                        pending_touches.push(TouchEvent {
                            // Pointer id 0 is reserved for the mouse bridge.
                            id: touch.id.wrapping_add(1),
                            x: (touch.location.x as f32 / w).clamp(0.0, 1.0),
                            y: (touch.location.y as f32 / h).clamp(0.0, 1.0),
                            phase,
                        });
                        window.request_redraw();
                    }
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        if !pending_touches.is_empty() {
                            synth.apply_touches(&pending_touches, now);
                            pending_touches.clear();
                        }
                        let tick = synth.tick(now);

                        if let Some(ref image) = current {
                            match compositor.render(
                                &context,
                                &tick.state,
                                image,
                                previous.as_ref(),
                            ) {
                                Ok(()) => {}
                                Err(wgpu::SurfaceError::Lost)
                                | Err(wgpu::SurfaceError::Outdated) => {
                                    context.resize(context.size);
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    error!("GPU out of memory; shutting down");
                                    elwt.exit();
                                }
                                Err(err) => {
                                    warn!(error = %err, "frame skipped");
                                }
                            }
                        }

                        if tick.image_ready {
                            // The fade has settled at full alpha; the old
                            // generation can never be sampled again.
                            if let Some(old) = previous.take() {
                                debug!(generation = old.id.0, "released previous generation");
                            }
                        }
                        if tick.animating {
                            window.request_redraw();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    let now = Instant::now();

                    // Upload a finished pyramid and start its crossfade.
                    if let Some(result) = filter_superseded(result_rx.take(), generation) {
                        match compositor.prepare_generation(
                            &context,
                            result.generation,
                            &result.image,
                            &result.keyframes,
                        ) {
                            Ok(upload) => {
                                previous = current.replace(upload);
                                let mut target = *synth.target();
                                target.generation = result.generation;
                                synth.update_target(target, now);
                                window.request_redraw();
                            }
                            Err(err) => {
                                warn!(error = %err, "image upload failed; keeping current wallpaper");
                            }
                        }
                    }

                    if now >= next_rotation {
                        if let Some(path) = source.next() {
                            generation = generation.next();
                            debug!(
                                generation = generation.0,
                                path = %path.display(),
                                "requesting next wallpaper"
                            );
                            let _ = request_tx.send(PyramidRequest {
                                generation,
                                path,
                                max_radius: max_blur_radius,
                            });
                        }
                        next_rotation = now + rotation_interval;
                    }

                    elwt.set_control_flow(ControlFlow::WaitUntil(next_rotation));
                }
                _ => {}
            }
        })
        .context("event loop terminated abnormally")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(generation: GenerationId) -> PyramidResult {
        PyramidResult {
            generation,
            image: RgbaImage::new(1, 1),
            keyframes: KeyframeSet::empty(),
        }
    }

    #[test]
    fn superseded_pyramid_result_is_discarded() {
        // A result for generation 1 arriving after generation 2 was requested
        // must never reach the compositor.
        let stale = filter_superseded(Some(result(GenerationId(1))), GenerationId(2));
        assert!(stale.is_none());
    }

    #[test]
    fn current_pyramid_result_passes_through() {
        let kept = filter_superseded(Some(result(GenerationId(2))), GenerationId(2));
        assert_eq!(kept.map(|r| r.generation), Some(GenerationId(2)));
        assert!(filter_superseded(None, GenerationId(2)).is_none());
    }
}
