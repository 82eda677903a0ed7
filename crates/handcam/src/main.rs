use handcam::{
    app::run_hand_detection,
    config::Settings,
    gui::GuiViewer,
    hand::tracking::HandTracker,
    video::webcam::{Webcam, WebcamOptions},
};

#[handcam::main]
fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    log::debug!("{:?}", settings);

    let mut tracker = HandTracker::from_options(&settings.hands, &settings.model_dir)?;
    let webcam = Webcam::open(
        WebcamOptions::default()
            .index(settings.camera)
            .fps(settings.fps),
    )?;
    let mut viewer = GuiViewer::new(settings.window_title.as_str());

    run_hand_detection(webcam, &mut tracker, &mut viewer, settings.mirror)?;
    Ok(())
}
