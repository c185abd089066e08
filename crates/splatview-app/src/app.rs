//! Application assembly and the frame-loop drive of the lifecycle manager

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::window::FileDragAndDrop;
use bevy_egui::EguiPlugin;
use splatview_core::settings::BACKGROUND_BLACK;
use splatview_core::{SceneSource, ViewerManager};

use crate::camera::CameraPlugin;
use crate::render::{
    rgb_to_color, BridgeSlot, EngineRendererFactory, RenderBridgeSlot, SplatScenePlugin,
    SurfaceReady,
};
use crate::ui::UiPlugin;

/// The lifecycle manager, sole owner of the renderer handle
#[derive(Resource)]
pub struct Viewer(pub ViewerManager<EngineRendererFactory>);

/// Scene requested on the command line, loaded on the first frame
#[derive(Resource)]
struct StartupScene(Option<SceneSource>);

/// Run the viewer application
pub fn run(startup: Option<SceneSource>) {
    let slot: BridgeSlot = Arc::new(Mutex::new(None));
    let surface_ready = Arc::new(AtomicBool::new(false));
    let factory = EngineRendererFactory::new(slot.clone(), surface_ready.clone());

    App::new()
        .insert_resource(ClearColor(rgb_to_color(BACKGROUND_BLACK)))
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "splatview".to_string(),
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Scenes are user files anywhere on disk, not bundled
                    // assets, so the asset root is the filesystem root.
                    file_path: "".to_string(),
                    meta_check: AssetMetaCheck::Never,
                    ..default()
                }),
        )
        .add_plugins(EguiPlugin::default())
        .insert_resource(RenderBridgeSlot(slot))
        .insert_resource(SurfaceReady(surface_ready))
        .insert_resource(Viewer(ViewerManager::new(factory)))
        .insert_resource(StartupScene(startup))
        .add_plugins(SplatScenePlugin)
        .add_plugins(CameraPlugin)
        .add_plugins(UiPlugin)
        .add_systems(
            Update,
            (load_startup_scene, handle_dropped_files, drive_viewer).chain(),
        )
        .add_systems(Last, dispose_on_exit)
        .run();
}

/// Pump the lifecycle manager once per rendered frame
fn drive_viewer(mut viewer: ResMut<Viewer>, time: Res<Time>) {
    viewer.0.tick(time.elapsed());
}

fn load_startup_scene(mut viewer: ResMut<Viewer>, mut startup: ResMut<StartupScene>) {
    if let Some(source) = startup.0.take() {
        viewer.0.load_scene(source);
    }
}

fn handle_dropped_files(
    mut viewer: ResMut<Viewer>,
    mut events: EventReader<FileDragAndDrop>,
) {
    for event in events.read() {
        if let FileDragAndDrop::DroppedFile { path_buf, .. } = event {
            viewer.0.load_scene(SceneSource::File(path_buf.clone()));
        }
    }
}

/// Release the renderer and any staged downloads when the window closes
fn dispose_on_exit(mut viewer: ResMut<Viewer>, mut exits: EventReader<AppExit>) {
    if exits.read().next().is_some() {
        viewer.0.dispose();
    }
}
