//! Reader for the OpenCV cascade XML layout written by
//! `opencv_traincascade` (`<cascade>` with `BOOST` stages of `HAAR`
//! features), as shipped in the `haarcascades` data directory.

use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::detection::infrastructure::haar_cascade::{
    CascadeError, HaarCascade, HaarFeature, Stage, TreeNode, WeakClassifier, WeightedRect,
};

pub fn parse(xml: &str) -> Result<HaarCascade, CascadeError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    if root.attribute("type_id") == Some("opencv-haar-classifier") {
        return Err(CascadeError::Unsupported(
            "legacy haar classifier format, convert it with opencv_traincascade".to_string(),
        ));
    }
    let cascade = root
        .descendants()
        .find(|n| n.has_tag_name("cascade"))
        .ok_or_else(|| malformed("no <cascade> element"))?;

    let stage_type = child_text(cascade, "stageType")?;
    if stage_type != "BOOST" {
        return Err(CascadeError::Unsupported(format!("stage type {stage_type}")));
    }
    let feature_type = child_text(cascade, "featureType")?;
    if feature_type != "HAAR" {
        return Err(CascadeError::Unsupported(format!(
            "feature type {feature_type}"
        )));
    }
    let width: u32 = parse_value(child_text(cascade, "width")?, "width")?;
    let height: u32 = parse_value(child_text(cascade, "height")?, "height")?;

    let stages = items(child(cascade, "stages")?)
        .enumerate()
        .map(|(i, node)| parse_stage(node).map_err(|e| context(e, &format!("stage {i}"))))
        .collect::<Result<Vec<_>, _>>()?;
    let features = items(child(cascade, "features")?)
        .enumerate()
        .map(|(i, node)| parse_feature(node).map_err(|e| context(e, &format!("feature {i}"))))
        .collect::<Result<Vec<_>, _>>()?;

    HaarCascade::new((width, height), stages, features)
}

fn parse_stage(node: Node) -> Result<Stage, CascadeError> {
    let threshold = parse_value(child_text(node, "stageThreshold")?, "stageThreshold")?;
    let classifiers = items(child(node, "weakClassifiers")?)
        .map(parse_weak_classifier)
        .collect::<Result<Vec<_>, _>>()?;
    if classifiers.is_empty() {
        return Err(malformed("stage has no weak classifiers"));
    }
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node) -> Result<WeakClassifier, CascadeError> {
    let raw: Vec<f64> = parse_list(child_text(node, "internalNodes")?, "internalNodes")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(malformed(&format!(
            "internalNodes holds {} values, expected groups of 4",
            raw.len()
        )));
    }
    let nodes = raw
        .chunks_exact(4)
        .map(|n| {
            let feature = n[2];
            if feature < 0.0 || feature.fract() != 0.0 {
                return Err(malformed(&format!("feature index {feature}")));
            }
            Ok(TreeNode {
                left: n[0] as i32,
                right: n[1] as i32,
                feature: feature as usize,
                threshold: n[3],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let leaves = parse_list(child_text(node, "leafValues")?, "leafValues")?;
    Ok(WeakClassifier { nodes, leaves })
}

fn parse_feature(node: Node) -> Result<HaarFeature, CascadeError> {
    if let Some(tilted) = node.children().find(|n| n.has_tag_name("tilted")) {
        if tilted.text().map(str::trim) == Some("1") {
            return Err(CascadeError::Unsupported("tilted haar features".to_string()));
        }
    }
    let rects = items(child(node, "rects")?)
        .map(|rect| {
            let text = rect.text().unwrap_or_default();
            let values: Vec<f64> = parse_list(text, "rect")?;
            let [x, y, w, h, weight] = values[..] else {
                return Err(malformed(&format!("rect {:?} needs 5 values", text.trim())));
            };
            if [x, y, w, h].iter().any(|v| *v < 0.0 || v.fract() != 0.0) {
                return Err(malformed(&format!("rect {:?} is not integral", text.trim())));
            }
            Ok(WeightedRect {
                x: x as u32,
                y: y as u32,
                width: w as u32,
                height: h as u32,
                weight,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HaarFeature { rects })
}

/// Element children named `_`, the anonymous sequence items of
/// `cv::FileStorage`.
fn items<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|n| n.has_tag_name("_"))
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Result<Node<'a, 'i>, CascadeError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| malformed(&format!("missing <{name}>")))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, CascadeError> {
    Ok(child(node, name)?.text().unwrap_or_default().trim())
}

fn parse_value<T: FromStr>(text: &str, what: &str) -> Result<T, CascadeError> {
    text.trim()
        .parse()
        .map_err(|_| malformed(&format!("{what} {text:?} is not a number")))
}

fn parse_list<T: FromStr>(text: &str, what: &str) -> Result<Vec<T>, CascadeError> {
    text.split_whitespace()
        .map(|token| parse_value(token, what))
        .collect()
}

fn malformed(message: &str) -> CascadeError {
    CascadeError::Malformed(message.to_string())
}

fn context(err: CascadeError, at: &str) -> CascadeError {
    match err {
        CascadeError::Malformed(message) => CascadeError::Malformed(format!("{at}: {message}")),
        other => other,
    }
}
