use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{DomainError, DomainResult};

pub const KEY_H_MIN: &str = "GREEN_H_MIN";
pub const KEY_H_MAX: &str = "GREEN_H_MAX";
pub const KEY_S_MIN: &str = "S_MIN";
pub const KEY_V_MIN: &str = "V_MIN";
pub const KEY_PROP: &str = "GREEN_PROP_THRESH";

/// Umbrales del filtro heurístico de hoja.
/// Rangos H/S/V en la cuantización de 8 bits (0..=255), proporción en [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdConfig {
    #[serde(rename = "GREEN_H_MIN")]
    pub h_min: u8,
    #[serde(rename = "GREEN_H_MAX")]
    pub h_max: u8,
    #[serde(rename = "S_MIN")]
    pub s_min: u8,
    #[serde(rename = "V_MIN")]
    pub v_min: u8,
    #[serde(rename = "GREEN_PROP_THRESH")]
    pub prop_thresh: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            h_min: 25,
            h_max: 100,
            s_min: 40,
            v_min: 40,
            prop_thresh: 0.03,
        }
    }
}

impl ThresholdConfig {
    /// Devuelve una copia con los campos presentes en `update` sustituidos.
    pub fn apply(&self, update: &ThresholdUpdate) -> Self {
        Self {
            h_min: update.h_min.unwrap_or(self.h_min),
            h_max: update.h_max.unwrap_or(self.h_max),
            s_min: update.s_min.unwrap_or(self.s_min),
            v_min: update.v_min.unwrap_or(self.v_min),
            prop_thresh: update.prop_thresh.unwrap_or(self.prop_thresh),
        }
    }
}

/// Actualización parcial: los campos ausentes conservan su valor previo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdUpdate {
    pub h_min: Option<u8>,
    pub h_max: Option<u8>,
    pub s_min: Option<u8>,
    pub v_min: Option<u8>,
    pub prop_thresh: Option<f64>,
}

impl ThresholdUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Interpreta un objeto JSON plano. Acepta números o cadenas numéricas
    /// (los formularios HTML envían todo como texto).
    pub fn from_json(value: &Value) -> DomainResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| DomainError::InvalidInput("expected a JSON object".into()))?;

        Ok(Self {
            h_min: obj.get(KEY_H_MIN).map(|v| channel_field(KEY_H_MIN, v)).transpose()?,
            h_max: obj.get(KEY_H_MAX).map(|v| channel_field(KEY_H_MAX, v)).transpose()?,
            s_min: obj.get(KEY_S_MIN).map(|v| channel_field(KEY_S_MIN, v)).transpose()?,
            v_min: obj.get(KEY_V_MIN).map(|v| channel_field(KEY_V_MIN, v)).transpose()?,
            prop_thresh: obj.get(KEY_PROP).map(|v| proportion_field(KEY_PROP, v)).transpose()?,
        })
    }

    /// Igual que `from_json` pero para pares clave/valor de un formulario.
    /// Los campos vacíos se ignoran.
    pub fn from_form<'a, I>(pairs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut obj = serde_json::Map::new();
        for (k, v) in pairs {
            let v = v.trim();
            if !v.is_empty() {
                obj.insert(k.to_string(), Value::String(v.to_string()));
            }
        }
        Self::from_json(&Value::Object(obj))
    }
}

fn channel_field(key: &str, v: &Value) -> DomainResult<u8> {
    let n = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| DomainError::InvalidInput(format!("{key} must be an integer, got {v}")))?;

    u8::try_from(n).map_err(|_| DomainError::InvalidInput(format!("{key} must be within 0..=255, got {n}")))
}

fn proportion_field(key: &str, v: &Value) -> DomainResult<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| DomainError::InvalidInput(format!("{key} must be a number, got {v}")))?;

    if !f.is_finite() || !(0.0..=1.0).contains(&f) {
        return Err(DomainError::InvalidInput(format!("{key} must be within 0..=1, got {f}")));
    }
    Ok(f)
}
