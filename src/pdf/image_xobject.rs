// 透過PNG → 画像XObject（DeviceRGB + SMask(DeviceGray)）

use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use super::optimizer::deflate;
use crate::error::SignError;
use crate::transparency::png::decode_to_rgba;

/// RGB本体とアルファ（SMask用）に分離した画像データ。
#[derive(Debug)]
pub struct SplitImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    /// すべて不透明の場合は `None`（SMask不要）。
    pub alpha: Option<Vec<u8>>,
}

/// PNGをデコードし、RGBとアルファの各プレーンに分離する。
pub fn split_png(png: &[u8]) -> crate::error::Result<SplitImage> {
    let rgba = decode_to_rgba(png)
        .map_err(|e| SignError::document(format!("cannot embed image: {e}")))?;
    let (width, height) = rgba.dimensions();

    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for px in rgba.as_raw().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }

    let alpha = if alpha.iter().all(|&a| a == u8::MAX) {
        None
    } else {
        Some(alpha)
    };

    Ok(SplitImage {
        width,
        height,
        rgb,
        alpha,
    })
}

/// zlibで圧縮
fn flate_encode(data: &[u8]) -> crate::error::Result<Vec<u8>> {
    deflate(data).map_err(|e| SignError::document(format!("Flate encode error: {e}")))
}

/// 透過PNGから画像XObjectを作成してドキュメントに追加する。
///
/// アルファを持つ場合は DeviceGray の SMask を別オブジェクトとして追加し、
/// 本体から参照する。戻り値は本体XObjectのオブジェクトID。
pub fn add_png_xobject(doc: &mut Document, png: &[u8]) -> crate::error::Result<ObjectId> {
    let split = split_png(png)?;
    let width = split.width as i64;
    let height = split.height as i64;

    let smask_id = match &split.alpha {
        Some(alpha) => {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            let stream = Stream::new(dict, flate_encode(alpha)?);
            Some(doc.add_object(Object::Stream(stream)))
        }
        None => None,
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if let Some(id) = smask_id {
        dict.set("SMask", Object::Reference(id));
    }
    let stream = Stream::new(dict, flate_encode(&split.rgb)?);
    Ok(doc.add_object(Object::Stream(stream)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transparency::png::encode_rgba_to_png;
    use flate2::read::ZlibDecoder;
    use image::{Rgba, RgbaImage};
    use std::io::Read;

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_split_separates_alpha() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([1, 2, 3, 255]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 0]));
        let split = split_png(&encode_rgba_to_png(&img).unwrap()).unwrap();

        assert_eq!(split.rgb, vec![1, 2, 3, 255, 255, 255]);
        assert_eq!(split.alpha, Some(vec![255, 0]));
    }

    #[test]
    fn test_opaque_image_has_no_smask() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255]));
        let mut doc = Document::with_version("1.5");
        let id = add_png_xobject(&mut doc, &encode_rgba_to_png(&img).unwrap()).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"SMask").is_err());
        assert_eq!(inflate(&stream.content).len(), 27);
    }

    #[test]
    fn test_transparent_image_references_smask() {
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 0]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        let mut doc = Document::with_version("1.5");
        let id = add_png_xobject(&mut doc, &encode_rgba_to_png(&img).unwrap()).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let smask_id = stream
            .dict
            .get(b"SMask")
            .and_then(Object::as_reference)
            .expect("SMask reference");
        let smask = doc.get_object(smask_id).unwrap().as_stream().unwrap();
        assert_eq!(
            smask.dict.get(b"ColorSpace").and_then(Object::as_name).unwrap(),
            b"DeviceGray"
        );
        let alpha = inflate(&smask.content);
        assert_eq!(alpha.len(), 8);
        assert_eq!(alpha[0], 255);
        assert_eq!(alpha[1], 0);
    }

    #[test]
    fn test_invalid_png_is_document_error() {
        let mut doc = Document::with_version("1.5");
        assert!(matches!(
            add_png_xobject(&mut doc, b"nope"),
            Err(SignError::DocumentError(_))
        ));
    }
}
