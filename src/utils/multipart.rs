//! Reads the check-in / check-out form out of a `multipart/form-data` body.

use std::collections::HashMap;

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;

use crate::attendance::{error::AttendanceError, evidence::EvidenceUpload};

/// Plain text fields are tiny; anything larger is not a coordinate or a device name.
const MAX_TEXT_FIELD_BYTES: usize = 1024;

#[derive(Debug)]
pub struct CheckForm {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub device: String,
    pub shift_id: Option<u64>,
    pub image: EvidenceUpload,
}

pub async fn read_check_form(
    mut payload: Multipart,
    max_image_bytes: usize,
) -> Result<CheckForm, AttendanceError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = payload.try_next().await.map_err(invalid_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_default();
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);
                let bytes = read_field(field, max_image_bytes, || {
                    format!("Image size too large (max {max_image_bytes} bytes)")
                })
                .await?;
                image = Some(EvidenceUpload {
                    bytes,
                    content_type,
                    file_name,
                });
            }
            "latitude" | "longitude" | "address" | "device" | "shift_id" => {
                let bytes = read_field(field, MAX_TEXT_FIELD_BYTES, || {
                    format!("{name} is too long")
                })
                .await?;
                let value = String::from_utf8(bytes)
                    .map_err(|_| AttendanceError::Validation(format!("{name} must be UTF-8")))?;
                fields.insert(name, value);
            }
            _ => {
                // drain unknown parts so the stream can advance
                read_field(field, MAX_TEXT_FIELD_BYTES, || {
                    format!("{name} is not an expected field")
                })
                .await?;
            }
        }
    }

    parse_fields(fields, image)
}

async fn read_field(
    mut field: Field,
    limit: usize,
    too_large: impl FnOnce() -> String,
) -> Result<Vec<u8>, AttendanceError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(invalid_body)? {
        if buf.len() + chunk.len() > limit {
            return Err(AttendanceError::Validation(too_large()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn invalid_body(e: actix_multipart::MultipartError) -> AttendanceError {
    AttendanceError::Validation(format!("Invalid multipart body: {e}"))
}

fn parse_fields(
    mut fields: HashMap<String, String>,
    image: Option<EvidenceUpload>,
) -> Result<CheckForm, AttendanceError> {
    let mut take = |key: &str| {
        fields
            .remove(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let latitude = parse_number(take("latitude"), "latitude")?;
    let longitude = parse_number(take("longitude"), "longitude")?;
    let device = take("device")
        .ok_or_else(|| AttendanceError::Validation("device is required".to_string()))?;
    let address = take("address");
    let shift_id = take("shift_id")
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| AttendanceError::Validation("shift_id must be a number".to_string()))
        })
        .transpose()?;
    let image =
        image.ok_or_else(|| AttendanceError::Validation("Image is required".to_string()))?;

    Ok(CheckForm {
        latitude,
        longitude,
        address,
        device,
        shift_id,
        image,
    })
}

fn parse_number(value: Option<String>, name: &str) -> Result<f64, AttendanceError> {
    let value =
        value.ok_or_else(|| AttendanceError::Validation(format!("{name} is required")))?;
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AttendanceError::Validation(format!("{name} must be a number")))
}
