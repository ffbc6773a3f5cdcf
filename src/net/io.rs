//! I/O 支持：JSON、RON 序列化, 以及几种网描述格式到 [`Net`] 的转换.
//!
//! 支持的网文件格式:
//! * 原生格式: 直接序列化的 [`Net`];
//! * 矩阵格式: `pre`/`post` 权重矩阵与初始标识
//!   (兼容 `incidence_negativa`/`incidence_positiva`/`marcado_inicial` 键名);
//! * 弧列表格式: `places`/`transitions`/`arcs`, 弧以下标引用库所和迁移.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::{InvalidNetError, Net};
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::structure::{Place, Transition, Weight};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid net: {0}")]
    InvalidNet(#[from] InvalidNetError),
    #[error("unsupported arc type {0:?}, only regular arcs are allowed")]
    UnsupportedArc(String),
}

pub fn to_json_string<T: Serialize>(value: &T) -> Result<String, IoError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T: DeserializeOwned>(s: &str) -> Result<T, IoError> {
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    create_parent(path.as_ref())?;
    fs::write(path, to_json_string(value)?)?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    from_json_str(&fs::read_to_string(path)?)
}

pub fn to_ron_string<T: Serialize>(value: &T) -> Result<String, IoError> {
    let mut pretty = PrettyConfig::default();
    pretty.new_line = "\n".into();
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T: DeserializeOwned>(s: &str) -> Result<T, IoError> {
    Ok(ron::from_str(s)?)
}

pub fn write_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    create_parent(path.as_ref())?;
    fs::write(path, to_ron_string(value)?)?;
    Ok(())
}

pub fn read_ron<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    from_ron_str(&fs::read_to_string(path)?)
}

pub(crate) fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// 矩阵格式. 行为库所, 列为迁移.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixNet {
    #[serde(alias = "incidence_negativa")]
    pub pre: Vec<Vec<Weight>>,
    #[serde(alias = "incidence_positiva")]
    pub post: Vec<Vec<Weight>>,
    #[serde(alias = "marcado_inicial")]
    pub initial_marking: Vec<Weight>,
    #[serde(default)]
    pub place_names: Option<Vec<String>>,
    #[serde(default)]
    pub transition_names: Option<Vec<String>>,
}

impl TryFrom<MatrixNet> for Net {
    type Error = InvalidNetError;

    fn try_from(value: MatrixNet) -> Result<Self, Self::Error> {
        let places = value.initial_marking.len();
        let transitions = value
            .pre
            .first()
            .or(value.post.first())
            .map(Vec::len)
            .unwrap_or(0);

        let shape_error = |matrix: &'static str, rows: &[Vec<Weight>]| {
            InvalidNetError::IncidenceShape {
                matrix,
                places: rows.len(),
                transitions: rows.first().map(Vec::len).unwrap_or(0),
                expected_places: places,
                expected_transitions: transitions,
            }
        };
        if value.pre.len() != places {
            return Err(shape_error("pre", &value.pre));
        }
        if value.post.len() != places {
            return Err(shape_error("post", &value.post));
        }

        let place_names = default_names(value.place_names, places, "p")?;
        let transition_names = default_names(value.transition_names, transitions, "t")?;

        let pre = Incidence::from_dense(value.pre.clone(), transitions)
            .ok_or_else(|| shape_error("pre", &value.pre))?;
        let post = Incidence::from_dense(value.post.clone(), transitions)
            .ok_or_else(|| shape_error("post", &value.post))?;

        let net = Net {
            places: place_names
                .into_iter()
                .zip(value.initial_marking)
                .map(|(name, tokens)| Place::new(name, tokens))
                .collect(),
            transitions: transition_names.into_iter().map(Transition::new).collect(),
            pre,
            post,
        };
        net.validate()?;
        Ok(net)
    }
}

fn default_names(
    names: Option<Vec<String>>,
    len: usize,
    prefix: &str,
) -> Result<Vec<String>, InvalidNetError> {
    match names {
        Some(names) if names.len() != len => Err(InvalidNetError::MarkingLength {
            expected: len,
            found: names.len(),
        }),
        Some(names) => Ok(names),
        None => Ok((0..len).map(|idx| format!("{}{}", prefix, idx)).collect()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcListPlace {
    pub index: usize,
    #[serde(default)]
    pub name: Option<String>,
    pub initial_marking: Weight,
    #[serde(default)]
    pub capacity: Option<Weight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcListTransition {
    pub index: usize,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcListArc {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// `true` 表示 place -> transition.
    pub from_place: bool,
    pub source: usize,
    pub target: usize,
    pub weight: Weight,
}

/// 弧列表格式.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcListNet {
    pub places: Vec<ArcListPlace>,
    pub transitions: Vec<ArcListTransition>,
    pub arcs: Vec<ArcListArc>,
}

impl TryFrom<ArcListNet> for Net {
    type Error = IoError;

    fn try_from(mut value: ArcListNet) -> Result<Self, Self::Error> {
        value.places.sort_by_key(|place| place.index);
        value.transitions.sort_by_key(|transition| transition.index);

        let mut net = Net::empty();
        let mut places: HashMap<usize, PlaceId> = HashMap::new();
        for place in value.places {
            let name = place
                .name
                .unwrap_or_else(|| format!("p{}", place.index));
            let id = net.add_place(Place {
                name,
                tokens: place.initial_marking,
                capacity: place.capacity,
            });
            places.insert(place.index, id);
        }
        let mut transitions: HashMap<usize, TransitionId> = HashMap::new();
        for transition in value.transitions {
            let name = transition
                .name
                .unwrap_or_else(|| format!("t{}", transition.index));
            transitions.insert(transition.index, net.add_transition(Transition::new(name)));
        }

        for arc in value.arcs {
            if let Some(kind) = arc.kind.as_deref() {
                if !matches!(kind, "regular" | "normal" | "") {
                    return Err(IoError::UnsupportedArc(kind.to_string()));
                }
            }
            let (place_index, transition_index) = if arc.from_place {
                (arc.source, arc.target)
            } else {
                (arc.target, arc.source)
            };
            let place = *places
                .get(&place_index)
                .ok_or_else(|| InvalidNetError::UnknownPlace(place_index.to_string()))?;
            let transition = *transitions.get(&transition_index).ok_or_else(|| {
                InvalidNetError::UnknownTransition(transition_index.to_string())
            })?;
            if arc.from_place {
                net.add_input_arc(place, transition, arc.weight)?;
            } else {
                net.add_output_arc(place, transition, arc.weight)?;
            }
        }
        net.validate()?;
        Ok(net)
    }
}

/// 任意支持格式的网文件.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NetFile {
    Native(Net),
    Matrix(MatrixNet),
    ArcList(ArcListNet),
}

impl TryFrom<NetFile> for Net {
    type Error = IoError;

    fn try_from(value: NetFile) -> Result<Self, Self::Error> {
        let net = match value {
            NetFile::Native(net) => net,
            NetFile::Matrix(matrix) => Net::try_from(matrix)?,
            NetFile::ArcList(arcs) => Net::try_from(arcs)?,
        };
        net.validate()?;
        Ok(net)
    }
}

/// 按扩展名选择解析方式并校验结果. RON 只接受原生格式.
pub fn load_net<P: AsRef<Path>>(path: P) -> Result<Net, IoError> {
    let path = path.as_ref();
    let net = match path.extension().and_then(|ext| ext.to_str()) {
        Some("ron") => read_ron::<_, Net>(path)?,
        _ => Net::try_from(read_json::<_, NetFile>(path)?)?,
    };
    net.validate()?;
    log::info!(
        "loaded net {:?}: {} places, {} transitions",
        path,
        net.places_len(),
        net.transitions_len()
    );
    Ok(net)
}

pub fn parse_net_json(content: &str) -> Result<Net, IoError> {
    Net::try_from(from_json_str::<NetFile>(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::structure::Tokens;

    #[test]
    fn matrix_format_with_legacy_keys() {
        let net = parse_net_json(
            r#"{
                "incidence_positiva": [[1, 0], [0, 1]],
                "incidence_negativa": [[0, 1], [1, 0]],
                "marcado_inicial": [1, 0]
            }"#,
        )
        .unwrap();

        assert_eq!(net.place_names(), vec!["p0", "p1"]);
        assert_eq!(net.transition_name(TransitionId::new(1)), "t1");
        assert_eq!(*net.pre.get(PlaceId::new(1), TransitionId::new(0)), 1);
        assert_eq!(*net.post.get(PlaceId::new(0), TransitionId::new(0)), 1);
        assert_eq!(net.initial_marking().tokens(PlaceId::new(0)), Tokens::Finite(1));
    }

    #[test]
    fn matrix_format_rejects_mismatched_rows() {
        let err = parse_net_json(
            r#"{ "pre": [[1]], "post": [[1], [0]], "initial_marking": [1] }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IoError::InvalidNet(InvalidNetError::IncidenceShape { matrix: "post", .. })
        ));
    }

    #[test]
    fn arc_list_format() {
        let net = parse_net_json(
            r#"{
                "places": [
                    { "index": 1, "type": "discrete", "initial_marking": 0 },
                    { "index": 0, "type": "discrete", "initial_marking": 2 }
                ],
                "transitions": [ { "index": 0, "type": "immediate" } ],
                "arcs": [
                    { "type": "regular", "from_place": true, "source": 0, "target": 0, "weight": 2 },
                    { "type": "regular", "from_place": false, "source": 0, "target": 1, "weight": 1 }
                ]
            }"#,
        )
        .unwrap();

        let t0 = TransitionId::new(0);
        assert_eq!(net.place_names(), vec!["p0", "p1"]);
        assert_eq!(*net.pre.get(PlaceId::new(0), t0), 2);
        assert_eq!(*net.post.get(PlaceId::new(1), t0), 1);
    }

    #[test]
    fn arc_list_rejects_dangling_and_special_arcs() {
        let dangling = parse_net_json(
            r#"{
                "places": [ { "index": 0, "initial_marking": 1 } ],
                "transitions": [ { "index": 0 } ],
                "arcs": [ { "from_place": true, "source": 3, "target": 0, "weight": 1 } ]
            }"#,
        );
        assert!(matches!(
            dangling,
            Err(IoError::InvalidNet(InvalidNetError::UnknownPlace(_)))
        ));

        let inhibitor = parse_net_json(
            r#"{
                "places": [ { "index": 0, "initial_marking": 1 } ],
                "transitions": [ { "index": 0 } ],
                "arcs": [ { "type": "inhibitor", "from_place": true, "source": 0, "target": 0, "weight": 1 } ]
            }"#,
        );
        assert!(matches!(inhibitor, Err(IoError::UnsupportedArc(_))));
    }

    #[test]
    fn native_format_round_trips_through_ron() {
        let net = parse_net_json(
            r#"{ "pre": [[1]], "post": [[2]], "initial_marking": [1] }"#,
        )
        .unwrap();
        let text = to_ron_string(&net).unwrap();
        let back: Net = from_ron_str(&text).unwrap();
        assert!(back.validate().is_ok());
        assert_eq!(back.place_names(), net.place_names());
        assert_eq!(back.pre, net.pre);
        assert_eq!(back.post, net.post);
    }

    #[test]
    fn load_net_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("pn-reach-io-{}", std::process::id()));
        let matrix = r#"{ "pre": [[1], [0]], "post": [[0], [1]], "initial_marking": [1, 0] }"#;
        let json_path = dir.join("net.json");
        create_parent(&json_path).unwrap();
        fs::write(&json_path, matrix).unwrap();
        let from_json = load_net(&json_path).unwrap();
        assert_eq!(from_json.place_names(), vec!["p0", "p1"]);

        let ron_path = dir.join("net.ron");
        write_ron(&ron_path, &from_json).unwrap();
        let from_ron = load_net(&ron_path).unwrap();
        assert_eq!(from_ron.pre, from_json.pre);
        assert_eq!(from_ron.initial_marking(), from_json.initial_marking());

        fs::write(dir.join("bad.ron"), matrix).unwrap();
        assert!(load_net(dir.join("bad.ron")).is_err());
        fs::remove_dir_all(dir).unwrap();
    }
}
