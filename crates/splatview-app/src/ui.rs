//! Overlay panels using bevy_egui
//!
//! Stateless views over the published `ViewerState`: drop zone, loading
//! overlay, settings / info / controls panels, and the error banner. User
//! intents go straight to the lifecycle manager.

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use rfd::FileDialog;
use splatview_core::settings::{
    BackgroundColor, BACKGROUND_BLACK, BACKGROUND_GRAY, BACKGROUND_WHITE,
};
use splatview_core::{SceneSource, SettingsUpdate, ViewerPhase, ViewerSettings};
use std::time::Duration;

use crate::app::Viewer;

/// Remote sample scene offered on the drop zone
pub const SAMPLE_SCENE_URL: &str =
    "https://huggingface.co/datasets/cakewalk/splat-data/resolve/main/nike.splat";

/// How long the error banner stays up before dismissing itself
const ERROR_BANNER_LIFETIME: Duration = Duration::from_secs(4);
/// Fade-out window at the end of the banner's lifetime
const ERROR_BANNER_FADE: Duration = Duration::from_millis(300);

const ACCENT: egui::Color32 = egui::Color32::from_rgb(0x4f, 0x8c, 0xff);

/// Tracks when the current error appeared, for timed dismissal
#[derive(Resource, Default)]
pub struct ErrorBanner {
    appeared_at: Option<Duration>,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ErrorBanner>()
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(
    mut contexts: EguiContexts,
    mut viewer: ResMut<Viewer>,
    mut banner: ResMut<ErrorBanner>,
    time: Res<Time>,
) {
    let ctx = contexts.ctx_mut().unwrap().clone();

    match viewer.0.state().phase() {
        ViewerPhase::Empty => drop_zone(&ctx, &mut viewer),
        ViewerPhase::Loading => loading_overlay(&ctx, viewer.0.state().progress),
        ViewerPhase::Active => {
            settings_panel(&ctx, &mut viewer);
            info_panel(&ctx, &viewer);
            controls_panel(&ctx, &mut viewer);
        }
    }

    error_banner(&ctx, &mut viewer, &mut banner, time.elapsed());
}

fn drop_zone(ctx: &egui::Context, viewer: &mut Viewer) {
    egui::Area::new(egui::Id::new("drop_zone"))
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            egui::Frame::window(&ctx.style()).show(ui, |ui| {
                ui.set_min_width(320.0);
                ui.vertical_centered(|ui| {
                    ui.heading("Drop a splat scene here");
                    ui.label(
                        egui::RichText::new("Supports .ply, .splat and .ksplat files")
                            .color(egui::Color32::GRAY),
                    );
                    ui.add_space(12.0);
                    if ui.button("Browse files").clicked() {
                        if let Some(path) = FileDialog::new()
                            .add_filter("Gaussian splat scenes", &["ply", "splat", "ksplat"])
                            .pick_file()
                        {
                            viewer.0.load_scene(SceneSource::File(path));
                        }
                    }
                    if ui.button("Load sample scene").clicked() {
                        viewer
                            .0
                            .load_scene(SceneSource::Url(SAMPLE_SCENE_URL.to_string()));
                    }
                });
            });
        });
}

fn loading_overlay(ctx: &egui::Context, progress: u8) {
    egui::Area::new(egui::Id::new("loading_overlay"))
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            egui::Frame::window(&ctx.style()).show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add(egui::Spinner::new().size(28.0));
                    ui.add_space(8.0);
                    ui.label("Loading scene");
                    ui.add(
                        egui::ProgressBar::new(progress as f32 / 100.0)
                            .desired_width(220.0)
                            .text(format!("{progress}%")),
                    );
                });
            });
        });
}

fn settings_panel(ctx: &egui::Context, viewer: &mut Viewer) {
    let settings = *viewer.0.settings();
    let memory_usage = viewer.0.state().memory_usage.clone();

    egui::Window::new("Settings")
        .default_pos([24.0, 72.0])
        .default_width(240.0)
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            ui.label("Background");
            ui.horizontal(|ui| {
                background_swatch(ui, viewer, &settings, BackgroundColor::Black, BACKGROUND_BLACK);
                background_swatch(ui, viewer, &settings, BackgroundColor::White, BACKGROUND_WHITE);
                background_swatch(ui, viewer, &settings, BackgroundColor::Gray, BACKGROUND_GRAY);

                let mut rgb = unpack_rgb(settings.custom_background_color);
                if ui.color_edit_button_srgb(&mut rgb).changed() {
                    viewer.0.update_settings(SettingsUpdate {
                        background_color: Some(BackgroundColor::Custom),
                        custom_background_color: Some(pack_rgb(rgb)),
                        ..Default::default()
                    });
                }
            });

            ui.separator();

            let mut point_cloud = settings.point_cloud_mode;
            if ui.checkbox(&mut point_cloud, "Point cloud mode").changed() {
                viewer.0.update_settings(SettingsUpdate {
                    point_cloud_mode: Some(point_cloud),
                    ..Default::default()
                });
            }

            let mut point_size = settings.point_size;
            if ui
                .add(
                    egui::Slider::new(&mut point_size, 0.1..=3.0)
                        .step_by(0.1)
                        .text("Point size"),
                )
                .changed()
            {
                viewer.0.update_settings(SettingsUpdate {
                    point_size: Some(point_size),
                    ..Default::default()
                });
            }

            ui.separator();

            let mut auto_rotate = settings.auto_rotate;
            if ui.checkbox(&mut auto_rotate, "Auto-rotate").changed() {
                viewer.0.update_settings(SettingsUpdate {
                    auto_rotate: Some(auto_rotate),
                    ..Default::default()
                });
            }

            let mut speed = settings.auto_rotate_speed;
            if ui
                .add_enabled(
                    settings.auto_rotate,
                    egui::Slider::new(&mut speed, 0.1..=3.0).step_by(0.1).text("Speed"),
                )
                .changed()
            {
                viewer.0.update_settings(SettingsUpdate {
                    auto_rotate_speed: Some(speed),
                    ..Default::default()
                });
            }

            ui.separator();
            ui.label(
                egui::RichText::new(format!("Memory: {memory_usage}"))
                    .color(egui::Color32::GRAY),
            );
        });
}

fn background_swatch(
    ui: &mut egui::Ui,
    viewer: &mut Viewer,
    settings: &ViewerSettings,
    preset: BackgroundColor,
    rgb: u32,
) {
    let selected = settings.background_color == preset;
    let stroke = if selected {
        egui::Stroke::new(2.0, ACCENT)
    } else {
        egui::Stroke::new(1.0, egui::Color32::DARK_GRAY)
    };
    let [r, g, b] = unpack_rgb(rgb);
    let button = egui::Button::new("")
        .fill(egui::Color32::from_rgb(r, g, b))
        .stroke(stroke)
        .min_size(egui::vec2(24.0, 24.0));
    if ui.add(button).clicked() {
        viewer.0.update_settings(SettingsUpdate {
            background_color: Some(preset),
            ..Default::default()
        });
    }
}

fn info_panel(ctx: &egui::Context, viewer: &Viewer) {
    let state = viewer.0.state();
    egui::Window::new("Scene")
        .anchor(egui::Align2::RIGHT_TOP, [-24.0, 72.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            egui::Grid::new("scene_info").num_columns(2).show(ui, |ui| {
                ui.label(egui::RichText::new("File").color(egui::Color32::GRAY));
                ui.label(&state.filename);
                ui.end_row();
                ui.label(egui::RichText::new("Splats").color(egui::Color32::GRAY));
                ui.label(&state.splat_count);
                ui.end_row();
                ui.label(egui::RichText::new("FPS").color(egui::Color32::GRAY));
                ui.label(state.fps.to_string());
                ui.end_row();
            });
        });
}

fn controls_panel(ctx: &egui::Context, viewer: &mut Viewer) {
    egui::Area::new(egui::Id::new("controls_panel"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -24.0])
        .show(ctx, |ui| {
            egui::Frame::window(&ctx.style()).show(ui, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Reset camera").clicked() {
                        viewer.0.reset_camera();
                    }
                    if ui.button("New file").clicked() {
                        viewer.0.reset_viewer();
                    }
                    ui.separator();
                    ui.label(
                        egui::RichText::new("drag to orbit, scroll to zoom, right-drag to pan")
                            .color(egui::Color32::GRAY),
                    );
                });
            });
        });
}

fn error_banner(
    ctx: &egui::Context,
    viewer: &mut Viewer,
    banner: &mut ErrorBanner,
    now: Duration,
) {
    let Some(message) = viewer.0.state().error.clone() else {
        banner.appeared_at = None;
        return;
    };

    let appeared = *banner.appeared_at.get_or_insert(now);
    let shown = now.saturating_sub(appeared);
    if shown >= ERROR_BANNER_LIFETIME {
        banner.appeared_at = None;
        viewer.0.dismiss_error();
        return;
    }

    let remaining = ERROR_BANNER_LIFETIME - shown;
    let alpha =
        (remaining.as_secs_f32() / ERROR_BANNER_FADE.as_secs_f32()).clamp(0.0, 1.0);

    egui::Area::new(egui::Id::new("error_banner"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -96.0])
        .show(ctx, |ui| {
            ui.set_opacity(alpha);
            egui::Frame::window(&ctx.style())
                .fill(egui::Color32::from_rgb(0xff, 0x44, 0x44))
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(&message).color(egui::Color32::WHITE));
                        if ui.button("✕").clicked() {
                            viewer.0.dismiss_error();
                            banner.appeared_at = None;
                        }
                    });
                });
        });
}

fn unpack_rgb(rgb: u32) -> [u8; 3] {
    [
        ((rgb >> 16) & 0xff) as u8,
        ((rgb >> 8) & 0xff) as u8,
        (rgb & 0xff) as u8,
    ]
}

fn pack_rgb([r, g, b]: [u8; 3]) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}
