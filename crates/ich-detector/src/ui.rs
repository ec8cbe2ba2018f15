use crate::app::{DisplayMode, IchApp};
use crate::config::IchConfig;
use crate::infer::Prediction;
use burn::prelude::Backend;
use eframe::egui::{self, Color32, RichText, Ui};

const TITLE_COLOR: Color32 = Color32::from_rgb(75, 139, 190);
const ALARM_COLOR: Color32 = Color32::from_rgb(200, 40, 40);
const CLEAR_COLOR: Color32 = Color32::from_rgb(40, 150, 70);

/// Headline for a prediction: alarm for a positive label, all-clear otherwise.
pub fn verdict(config: &IchConfig, prediction: &Prediction) -> (&'static str, bool) {
    if config.is_positive(&prediction.label) {
        ("ICH DETECTED!", true)
    } else {
        ("No ICH Detected.", false)
    }
}

/// Draws the left panel: description, model facts and display options.
pub fn draw_side_panel<B: Backend>(app: &mut IchApp<B>, ctx: &egui::Context) {
    egui::SidePanel::left("options_panel").show(ctx, |ui| {
        ui.heading("ICH Detector");
        ui.label(
            "Detects intracranial hemorrhage (ICH) in MRI brain scans. \
             Upload an image to get a classification.",
        );
        ui.separator();

        let config = app.predictor.config();

        egui::CollapsingHeader::new("Project Overview").show(ui, |ui| {
            ui.label("Classifies MRI brain scans for intracranial hemorrhage");
            ui.label(format!("Output: {}", config.labels.join(" or ")));
            ui.label("Convolutional network with spatial attention");
        });

        egui::CollapsingHeader::new("Model Details").show(ui, |ui| {
            ui.label("Architecture: CNN with attention");
            ui.label(format!("Input size: {0} x {0} x 3", config.image_size));
            ui.label(format!("Classes: {}", config.model.num_classes));
            ui.label("Weights: burn record (.mpk) or PyTorch (.pt)");
        });

        ui.separator();
        draw_options(app, ui);
    });
}

fn draw_options<B: Backend>(app: &mut IchApp<B>, ui: &mut Ui) {
    ui.heading("Options");

    egui::ComboBox::from_label("Display Mode")
        .selected_text(format!("{:?}", app.display_mode))
        .show_ui(ui, |ui| {
            ui.selectable_value(&mut app.display_mode, DisplayMode::Basic, "Basic");
            ui.selectable_value(&mut app.display_mode, DisplayMode::Detailed, "Detailed");
        });

    egui::ComboBox::from_label("Show Confidence Score?")
        .selected_text(if app.show_confidence { "Yes" } else { "No" })
        .show_ui(ui, |ui| {
            ui.selectable_value(&mut app.show_confidence, true, "Yes");
            ui.selectable_value(&mut app.show_confidence, false, "No");
        });
}

/// Draws the upload controls, preview and result.
pub fn draw_central_panel<B: Backend>(app: &mut IchApp<B>, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("ICH Detection from MRI Scans").heading().color(TITLE_COLOR));
                ui.label(
                    RichText::new("Upload an MRI image or use the sample image to detect intracranial hemorrhage")
                        .color(Color32::GRAY),
                );
            });
            ui.separator();

            draw_upload_controls(app, ui, ctx);

            if let Some(error) = &app.error {
                ui.colored_label(ALARM_COLOR, error);
            }

            if app.outcome.is_some() {
                ui.separator();
                draw_outcome(app, ui);
            }
        });
    });
}

fn draw_upload_controls<B: Backend>(app: &mut IchApp<B>, ui: &mut Ui, ctx: &egui::Context) {
    ui.heading("Upload MRI Image");
    ui.label("Enter the path of a JPG, JPEG or PNG image, or drop the file onto this window.");

    ui.horizontal(|ui| {
        let field = ui.text_edit_singleline(&mut app.upload_path);
        let entered = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        if (ui.button("Upload").clicked() || entered) && !app.upload_path.trim().is_empty() {
            app.submit_upload_path(ctx);
        }
    });

    if ui.button("Use Sample Image Instead").clicked() {
        app.submit_sample(ctx);
    }
}

fn draw_outcome<B: Backend>(app: &IchApp<B>, ui: &mut Ui) {
    let Some(outcome) = &app.outcome else {
        return;
    };

    ui.heading("Preview:");
    ui.label(format!(
        "File: {} | Size: {} x {} px",
        outcome.display_name, outcome.size.0, outcome.size.1
    ));
    ui.vertical_centered(|ui| {
        ui.add(egui::Image::new(&outcome.preview).max_width(360.0));
        ui.label(RichText::new("MRI Image").small());
    });
    ui.separator();

    ui.heading("Prediction Result:");
    let config = app.predictor.config();
    let (headline, alarm) = verdict(config, &outcome.prediction);
    let color = if alarm { ALARM_COLOR } else { CLEAR_COLOR };
    ui.label(RichText::new(headline).strong().size(20.0).color(color));

    if app.show_confidence {
        ui.label(format!("Model Confidence: {}", outcome.prediction.confidence_percent()));
    }

    if app.display_mode == DisplayMode::Detailed {
        egui::Grid::new("probabilities").striped(true).show(ui, |ui| {
            for (index, (label, p)) in config.labels.iter().zip(&outcome.prediction.probabilities).enumerate() {
                let text = RichText::new(label);
                ui.label(if index == outcome.prediction.class_index { text.strong() } else { text });
                ui.label(format!("{:.2}%", p * 100.0));
                ui.end_row();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: &str, confidence: f32) -> Prediction {
        Prediction {
            class_index: usize::from(label == "ICH"),
            label: label.to_string(),
            confidence,
            probabilities: vec![1.0 - confidence, confidence],
        }
    }

    #[test]
    fn positive_label_raises_the_alarm() {
        let config = IchConfig::ich();

        assert_eq!(verdict(&config, &prediction("ICH", 0.9)), ("ICH DETECTED!", true));
    }

    #[test]
    fn negative_label_is_all_clear() {
        let config = IchConfig::ich();

        assert_eq!(verdict(&config, &prediction("No ICH", 0.7)), ("No ICH Detected.", false));
    }
}
