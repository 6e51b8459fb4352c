use anyhow::Context;
use crossbeam_channel::bounded;

use arbor_vertex::{
    AttrFormat, AttrType, Attribute, Backend, Device, Engine, EngineConfig, Handle,
    HeadlessDevice, Shader, VertexSlice,
};

const TRIANGLES: usize = 6;

fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("failed to read configuration")?;
    log4rs::init_file(&config.log_config, Default::default())
        .context("failed to load logging config file")?;

    #[cfg(feature = "tracing")]
    let _client = tracy_client::Client::start();

    let format = AttrFormat::new([
        Attribute::new("in_position", AttrType::Vec2),
        Attribute::new("in_color", AttrType::Vec4),
    ]);

    let (program_tx, program_rx) = bounded::<Handle>(1);
    let names: Vec<String> = format.names().map(str::to_owned).collect();
    let backend = config.backend;
    let mut engine = Engine::new(&config, move || {
        let (device, program) = create_device(backend, &names)?;
        let _ = program_tx.send(program);
        Ok(device)
    })
    .context("failed to create engine")?;

    let program = program_rx
        .recv()
        .context("render thread failed before registering the program")?;
    let shader = Shader::new(program, format);

    let strip = engine.call(move |ctx| {
        let mut strip = VertexSlice::new(ctx, &shader, 0, 4)?;
        strip.begin(ctx)?;
        for n in 1..=TRIANGLES {
            strip.set_len(ctx, n * 3)?;
            strip
                .slice((n - 1) * 3, n * 3)?
                .set_vertex_data(ctx, &triangle(n))?;
        }
        strip.end(ctx)?;

        // The Vulkan backend stores vertices but has no pipeline to draw them with.
        if backend == Backend::Headless {
            strip.with_bound_draw(ctx, |ctx| strip.draw(ctx))?;
        }
        Ok(strip)
    })?;
    log::info!(
        "built strip of {} vertices (capacity {}, {} floats per vertex)",
        strip.len(),
        strip.capacity(),
        strip.stride()
    );

    // Dropped here, deleted on the render thread.
    drop(strip);

    engine.shutdown()?;
    log::info!("statistics: {}", engine.stats().snapshot());
    Ok(())
}

fn create_device(backend: Backend, attributes: &[String]) -> anyhow::Result<(Box<dyn Device>, Handle)> {
    match backend {
        Backend::Headless => {
            let mut device = HeadlessDevice::new();
            let program = device.register_program(attributes);
            Ok((Box::new(device), program))
        }
        #[cfg(feature = "vulkan")]
        Backend::Vulkan => {
            let mut device = arbor_vertex::vulkan::VulkanDevice::new()
                .context("failed to create Vulkan device")?;
            let locations: Vec<(&str, u32)> = attributes
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_str(), i as u32))
                .collect();
            let program = device.register_program(&locations);
            Ok((Box::new(device), program))
        }
        #[cfg(not(feature = "vulkan"))]
        Backend::Vulkan => anyhow::bail!("built without the `vulkan` feature"),
    }
}

fn triangle(n: usize) -> Vec<f32> {
    let x = n as f32;
    let shade = n as f32 / TRIANGLES as f32;
    [[x, 0.0], [x + 1.0, 0.0], [x + 0.5, 1.0]]
        .iter()
        .flat_map(|[px, py]| [*px, *py, shade, shade, 1.0 - shade, 1.0])
        .collect()
}
