//! Demo: load a handful of resources through the registry
//!
//! Reads `resources.ron` from the working directory when present. If the
//! configured asset root exists the filesystem pipeline is used, otherwise a
//! small in-memory asset set stands in for it.

use std::cell::Cell;
use std::rc::Rc;

use engine_resources::assets::{AudioData, ImageData};
use engine_resources::core::logging;
use engine_resources::prelude::*;
use engine_resources::resources::handlers::{Material, Scene, Texture};

fn demo_assets() -> MemoryAssetPipeline {
    let mut pipeline = MemoryAssetPipeline::default();
    pipeline.insert(
        "crate.ron",
        AssetData::Text(r#"(color: (0.6, 0.4, 0.2), diffuse_map: Some("crate.png"))"#.into()),
    );
    pipeline.insert("crate.png", AssetData::Image(ImageData::solid(16, 16, [150, 100, 50, 255])));
    for face in ["px", "nx", "py", "ny", "pz", "nz"] {
        pipeline.insert(face, AssetData::Image(ImageData::solid(4, 4, [90, 140, 220, 255])));
    }
    pipeline.insert(
        "level.ron",
        AssetData::Text(
            r#"(
                name: "demo",
                nodes: [
                    (name: "crate", attachments: [(resource_type: Material, name: "crate.ron")]),
                ],
            )"#
            .into(),
        ),
    );
    pipeline.insert(
        "beep.wav",
        AssetData::Audio(AudioData {
            channels: 1,
            sample_rate: 8000,
            samples: (0..800).map(|i| (i as f32 * 0.1).sin() * 0.5).collect(),
        }),
    );
    pipeline
}

fn run<P: AssetPipeline>(mut registry: ResourceRegistry<P>) -> Result<(), ResourceError> {
    let loaded = Rc::new(Cell::new(0));

    let counter = Rc::clone(&loaded);
    let scene = registry.request(
        "level",
        ResourceType::Scene,
        RequestInfo::new()
            .with_asset(AssetDescriptor::new("level.ron", AssetKind::Text))
            .on_loaded(move |_, _| counter.set(counter.get() + 1)),
    )?;

    let counter = Rc::clone(&loaded);
    let sky = registry.request(
        "sky",
        ResourceType::Texture,
        RequestInfo::new()
            .with_assets(
                ["px", "nx", "py", "ny", "pz", "nz"]
                    .map(|face| AssetDescriptor::new(face, AssetKind::Image)),
            )
            .with_params(ResourceParams::Texture(TextureDimension::Cube))
            .on_loaded(move |_, _| counter.set(counter.get() + 1)),
    )?;

    let beep = registry.request(
        "beep",
        ResourceType::Audio,
        RequestInfo::new().with_asset(AssetDescriptor::new("beep.wav", AssetKind::Audio)),
    )?;

    // Pump until the pipeline goes quiet
    for frame in 0..60 {
        if registry.update() == 0 && registry.in_flight_count() == 0 {
            log::info!("All requests settled after {frame} frames");
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    if let Some(texture) = registry.payload::<Texture>(sky) {
        log::info!(
            "Sky: {} layers of {}x{}",
            texture.layer_count(),
            texture.width,
            texture.height
        );
    }
    if let Some(scene_data) = registry.payload::<Scene>(scene) {
        log::info!("Scene '{}' with {} nodes", scene_data.config.name, scene_data.node_count());
    }
    if let Some(material) = registry
        .find("crate.ron", ResourceType::Material)
        .and_then(|handle| registry.payload::<Material>(handle))
    {
        log::info!("Crate material uniform: {:?}", material.uniform());
    }

    let mut mixer = Mixer::new(4);
    if let Ok(instance) = create_audio_instance(&mut registry, beep) {
        mixer.play(&mut registry, 0, instance);
        let mut buffer = Vec::new();
        mixer.mix(&mut registry, 256, &mut buffer);
        log::info!("Mixed {} stereo frames", buffer.len() / 2);
    }

    log::info!(
        "{} callbacks fired, {} resources live",
        loaded.get(),
        registry.resource_count()
    );

    registry.release(beep);
    registry.release(sky);
    registry.release(scene);
    mixer.cleanup_stale(&mut registry);
    log::info!("After release: {} resources live", registry.resource_count());
    Ok(())
}

fn main() {
    let config = match RegistryConfig::load_ron("resources.ron") {
        Ok(config) => config,
        Err(_) => RegistryConfig::default(),
    };
    logging::init(&config);

    let result = if config.asset_root.is_dir() {
        log::info!("Loading assets from {}", config.asset_root.display());
        let pipeline = FileAssetPipeline::new(&config);
        ResourceRegistry::with_builtin_handlers(config, pipeline).and_then(run)
    } else {
        ResourceRegistry::with_builtin_handlers(config, demo_assets()).and_then(run)
    };

    if let Err(e) = result {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}
