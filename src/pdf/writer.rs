// XObjectのリソース登録とコンテンツストリーム追記

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::SignError;
use crate::geometry::Rect;
use crate::pdf::reader::{PageBox, inherited_attribute};

/// `Resources` がページ辞書のどこにあるか。
enum ResourcesLocation {
    Inline,
    Indirect(ObjectId),
}

/// ページが直接持つResourcesを特定する。
///
/// ページに無い場合は継承元（Parent）の内容をコピーしてページにinlineで持たせる。
/// 継承されたResourcesを直接書き換えると兄弟ページにも影響するため。
fn locate_resources(
    doc: &mut Document,
    page_id: ObjectId,
) -> crate::error::Result<ResourcesLocation> {
    let inherited = {
        let page_dict = doc.get_dictionary(page_id)?;
        match page_dict.get(b"Resources") {
            Ok(Object::Reference(id)) => return Ok(ResourcesLocation::Indirect(*id)),
            Ok(Object::Dictionary(_)) => return Ok(ResourcesLocation::Inline),
            _ => match inherited_attribute(doc, page_dict, b"Resources") {
                Some(Object::Dictionary(dict)) => dict.clone(),
                Some(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
                _ => Dictionary::new(),
            },
        }
    };

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(inherited));
    Ok(ResourcesLocation::Inline)
}

fn resources_mut<'a>(
    doc: &'a mut Document,
    page_id: ObjectId,
    location: &ResourcesLocation,
) -> crate::error::Result<&'a mut Dictionary> {
    match location {
        ResourcesLocation::Indirect(id) => Ok(doc.get_dictionary_mut(*id)?),
        ResourcesLocation::Inline => Ok(doc
            .get_dictionary_mut(page_id)?
            .get_mut(b"Resources")?
            .as_dict_mut()?),
    }
}

/// `prefix` + 連番で、辞書に存在しない名前を返す。
fn free_name(dict: &Dictionary, prefix: &str) -> String {
    let mut n = 0usize;
    loop {
        let name = format!("{prefix}{n}");
        if !dict.has(name.as_bytes()) {
            return name;
        }
        n += 1;
    }
}

/// ページの `/Resources /XObject` に画像XObjectを登録し、割り当てた名前を返す。
///
/// XObjectサブ辞書は inline / indirect のどちらにも対応する。
pub fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    xobject_id: ObjectId,
    prefix: &str,
) -> crate::error::Result<String> {
    let location = locate_resources(doc, page_id)?;

    let xobject_ref = match resources_mut(doc, page_id, &location)?.get(b"XObject") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    let xobjects = match xobject_ref {
        Some(id) => doc.get_dictionary_mut(id)?,
        None => {
            let resources = resources_mut(doc, page_id, &location)?;
            if !matches!(resources.get(b"XObject"), Ok(Object::Dictionary(_))) {
                resources.set("XObject", Object::Dictionary(Dictionary::new()));
            }
            resources.get_mut(b"XObject")?.as_dict_mut()?
        }
    };

    let name = free_name(xobjects, prefix);
    xobjects.set(name.as_str(), Object::Reference(xobject_id));
    Ok(name)
}

/// 画像の単位正方形をページに置く `cm` 行列 `[a b c d e f]` を求める。
///
/// `rect` は表示座標（`/Rotate` 適用後、ページボックス左下が原点）。
/// 回転を打ち消してユーザー空間へ戻し、画像が表示上で正立するようにする。
pub fn placement_matrix(rect: &Rect, page: &PageBox, rotation: u16) -> [f64; 6] {
    let (w, h) = (rect.width(), rect.height());
    let (u0, v0) = (rect.x0, rect.y0);
    let (pw, ph) = (page.width, page.height);
    let [a, b, c, d, e, f] = match rotation {
        90 => [0.0, w, -h, 0.0, pw - v0, u0],
        180 => [-w, 0.0, 0.0, -h, pw - u0, ph - v0],
        270 => [0.0, -w, h, 0.0, v0, ph - u0],
        _ => [w, 0.0, 0.0, h, u0, v0],
    };
    [a, b, c, d, e + page.llx, f + page.lly]
}

fn fmt_operand(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else {
        format!("{v:.4}")
    }
}

/// 1つの配置を描画するコンテンツストリームを生成する。
///
/// `q <a> <b> <c> <d> <e> <f> cm /<name> Do Q`
pub fn placement_content(name: &str, matrix: &[f64; 6]) -> Vec<u8> {
    let operands: Vec<String> = matrix.iter().map(|v| fmt_operand(*v)).collect();
    format!("q {} cm /{name} Do Q\n", operands.join(" ")).into_bytes()
}

/// ページの `/Contents` を参照の配列に正規化する。
fn contents_as_refs(doc: &mut Document, page_id: ObjectId) -> crate::error::Result<Vec<Object>> {
    let existing = doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();

    let refs = match existing {
        None | Some(Object::Null) => Vec::new(),
        Some(Object::Reference(id)) => match doc.get_object(id)? {
            Object::Array(arr) => arr.clone(),
            Object::Stream(_) => vec![Object::Reference(id)],
            _ => return Err(SignError::document("Invalid page Contents")),
        },
        Some(Object::Array(arr)) => arr,
        Some(Object::Stream(stream)) => vec![Object::Reference(doc.add_object(stream))],
        Some(_) => return Err(SignError::document("Invalid page Contents")),
    };
    Ok(refs)
}

fn add_content_stream(doc: &mut Document, content: Vec<u8>) -> Object {
    Object::Reference(doc.add_object(Stream::new(Dictionary::new(), content)))
}

/// 既存のコンテンツを `q … Q` で囲む。ページごとに1回だけ呼ぶこと。
pub fn wrap_page_contents(doc: &mut Document, page_id: ObjectId) -> crate::error::Result<()> {
    let existing = contents_as_refs(doc, page_id)?;
    if existing.is_empty() {
        return Ok(());
    }

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(add_content_stream(doc, b"q\n".to_vec()));
    contents.extend(existing);
    contents.push(add_content_stream(doc, b"\nQ\n".to_vec()));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// コンテンツストリームをページ末尾に追加する。
pub fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> crate::error::Result<()> {
    let mut contents = contents_as_refs(doc, page_id)?;
    contents.push(add_content_stream(doc, content));
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}
