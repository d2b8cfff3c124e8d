//! Páginas HTML mínimas (subida, resultado, administración, vista previa).

use crate::application::services::Diagnosis;
use crate::domain::thresholds::ThresholdConfig;

/// Prefijo público del directorio de subidas.
pub const UPLOADS_URL: &str = "/uploads";

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }}
.error {{ color: #b00020; }}
.success {{ color: #1b5e20; }}
img {{ max-width: 100%; border: 1px solid #ccc; }}
label {{ display: block; margin-top: .5rem; }}
</style>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

fn message(class: &str, text: Option<&str>) -> String {
    text.map(|t| format!(r#"<p class="{class}">{}</p>"#, escape(t)))
        .unwrap_or_default()
}

const UPLOAD_FORM: &str = r#"<form method="post" action="/" enctype="multipart/form-data">
<input type="file" name="file" accept=".jpg,.jpeg,.png">
<button type="submit">Upload and Predict</button>
</form>"#;

pub fn index(error: Option<&str>) -> String {
    layout("Tomato Disease Detector", &format!("{}\n{UPLOAD_FORM}", message("error", error)))
}

pub fn result(d: &Diagnosis) -> String {
    let file = escape(&d.filename);
    let uncertain = if d.uncertain {
        "<p><em>Low confidence: consider uploading a clearer photo.</em></p>"
    } else {
        ""
    };
    let body = format!(
        r#"<p><img src="{UPLOADS_URL}/{file}" alt="{file}"></p>
<p>Prediction: <strong>{label}</strong></p>
<p>Confidence: {confidence}</p>
{uncertain}
<p>{description}</p>
<p><a href="/preview/{file}">Show leaf mask</a></p>
{UPLOAD_FORM}"#,
        label = escape(&d.prediction.label),
        confidence = escape(&d.prediction.confidence_display()),
        description = escape(d.prediction.description()),
    );
    layout("Tomato Disease Detector", &body)
}

pub fn admin(cfg: &ThresholdConfig, success: Option<&str>, error: Option<&str>) -> String {
    let body = format!(
        r#"{success}{error}
<form method="post" action="/admin">
<label>GREEN_H_MIN <input name="GREEN_H_MIN" value="{h_min}"></label>
<label>GREEN_H_MAX <input name="GREEN_H_MAX" value="{h_max}"></label>
<label>S_MIN <input name="S_MIN" value="{s_min}"></label>
<label>V_MIN <input name="V_MIN" value="{v_min}"></label>
<label>GREEN_PROP_THRESH <input name="GREEN_PROP_THRESH" value="{prop}"></label>
<button type="submit">Save</button>
</form>"#,
        success = message("success", success),
        error = message("error", error),
        h_min = cfg.h_min,
        h_max = cfg.h_max,
        s_min = cfg.s_min,
        v_min = cfg.v_min,
        prop = cfg.prop_thresh,
    );
    layout("Leaf filter thresholds", &body)
}

pub fn preview(filename: &str, mask_name: &str) -> String {
    let body = format!(
        r#"<h2>Original</h2>
<p><img src="{UPLOADS_URL}/{file}" alt="{file}"></p>
<h2>Green mask</h2>
<p><img src="{UPLOADS_URL}/{mask}" alt="{mask}"></p>
<p><a href="/">Back</a></p>"#,
        file = escape(filename),
        mask = escape(mask_name),
    );
    layout("Mask preview", &body)
}
