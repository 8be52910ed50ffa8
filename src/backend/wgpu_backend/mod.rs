//! wgpu device implementation
//!
//! Slot regions are uploaded into per-slot `wgpu::Buffer`s with
//! `Queue::write_buffer`. Retirement is reported by
//! `Queue::on_submitted_work_done`, whose callbacks run while the device is
//! polled, so waiting on the timeline polls the device.
//!
//! This backend exercises uploads and fencing only. Recorded commands are
//! encoded as debug markers; `Clear`, `SetPipeline` and `Draw` are not
//! executed, since no render pipelines or shaders are created.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Device, DeviceError, DeviceResult, Submission};
use crate::fence::{CpuTimeline, FenceTimeline, FenceToken};

/// Fence timeline driven by `wgpu` queue completion callbacks
#[derive(Debug)]
pub struct WgpuTimeline {
    device: Arc<wgpu::Device>,
    retired: CpuTimeline,
}

impl FenceTimeline for WgpuTimeline {
    fn completed(&self) -> FenceToken {
        self.device.poll(wgpu::Maintain::Poll);
        self.retired.completed()
    }

    fn wait_until(&self, token: FenceToken) {
        while self.retired.completed() < token {
            self.device.poll(wgpu::Maintain::Wait);
        }
    }

    fn wait_until_timeout(&self, token: FenceToken, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.device.poll(wgpu::Maintain::Poll);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self
                .retired
                .wait_until_timeout(token, remaining.min(Duration::from_millis(1)))
            {
                return true;
            }
            if remaining.is_zero() {
                return false;
            }
        }
    }
}

/// Device buffers mirroring one frame slot
#[derive(Default)]
struct SlotBuffers {
    pass: Option<wgpu::Buffer>,
    objects: Option<wgpu::Buffer>,
    materials: Option<wgpu::Buffer>,
    vertices: Option<wgpu::Buffer>,
}

/// wgpu device implementation
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: wgpu::Queue,
    timeline: Arc<WgpuTimeline>,
    slots: Vec<SlotBuffers>,
    adapter_name: String,
}

impl WgpuDevice {
    /// Create a device without a surface.
    pub fn new_headless(label: &str) -> DeviceResult<Self> {
        pollster::block_on(Self::new_async(label))
    }

    pub async fn new_async(label: &str) -> DeviceResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| DeviceError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Found adapter: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(label),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("Uncaptured wgpu error: {}", error);
        }));

        let device = Arc::new(device);
        let timeline = Arc::new(WgpuTimeline {
            device: Arc::clone(&device),
            retired: CpuTimeline::new(),
        });

        Ok(Self {
            device,
            queue,
            timeline,
            slots: Vec::new(),
            adapter_name: adapter_info.name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &mut Option<wgpu::Buffer>,
        label: &str,
        usage: wgpu::BufferUsages,
        bytes: &[u8],
    ) {
        if bytes.is_empty() {
            return;
        }

        let size = bytes.len() as u64;
        if target.as_ref().map_or(true, |buffer| buffer.size() < size) {
            log::debug!("Allocating {} buffer of {} bytes", label, size);
            *target = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if let Some(buffer) = target {
            queue.write_buffer(buffer, 0, bytes);
        }
    }
}

impl Device for WgpuDevice {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn timeline(&self) -> Arc<dyn FenceTimeline> {
        self.timeline.clone()
    }

    fn submit(&mut self, submission: Submission<'_>) -> DeviceResult<()> {
        let slot = submission.slot;
        let commands = submission.commands();
        if !commands.is_closed() {
            return Err(DeviceError::Rejected(format!(
                "command list of slot {} is not closed",
                slot.index()
            )));
        }

        if self.slots.len() <= slot.index() {
            self.slots.resize_with(slot.index() + 1, SlotBuffers::default);
        }
        let buffers = &mut self.slots[slot.index()];
        let uniform = wgpu::BufferUsages::UNIFORM;
        Self::upload(
            &self.device,
            &self.queue,
            &mut buffers.pass,
            "Pass Constants",
            uniform,
            slot.pass_region().as_bytes(),
        );
        Self::upload(
            &self.device,
            &self.queue,
            &mut buffers.objects,
            "Object Constants",
            uniform,
            slot.object_region().as_bytes(),
        );
        Self::upload(
            &self.device,
            &self.queue,
            &mut buffers.materials,
            "Material Constants",
            uniform,
            slot.material_region().as_bytes(),
        );
        Self::upload(
            &self.device,
            &self.queue,
            &mut buffers.vertices,
            "Dynamic Vertices",
            wgpu::BufferUsages::VERTEX,
            slot.dynamic_vertex_region().as_bytes(),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        encoder.push_debug_group(&format!("slot {} ({})", slot.index(), submission.token));
        encoder.insert_debug_marker(&format!("{} draws", commands.draw_count()));
        encoder.pop_debug_group();

        self.queue.submit(std::iter::once(encoder.finish()));

        let timeline = Arc::clone(&self.timeline);
        let token = submission.token;
        self.queue.on_submitted_work_done(move || {
            timeline.retired.signal(token);
        });

        Ok(())
    }
}
