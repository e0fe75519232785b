use serde::{Deserialize, Serialize};

use crate::error::SpatioError;

/// 实时连接上解码出的事件
///
/// 确认帧（`+OK`）在解码器内部丢弃，不会出现在这里。
#[derive(Debug)]
pub enum LiveEvent<T> {
    /// 成功解码的 JSON 载荷
    Object(T),
    /// 普通文本，或看起来像 JSON 但解析失败的载荷
    Raw(String),
    /// 单帧错误，连接保持打开
    Error(SpatioError),
    /// 致命错误，之后连接会被关闭，不再有事件
    Fatal(SpatioError),
}

impl<T> LiveEvent<T> {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LiveEvent::Fatal(_))
    }

    pub fn as_object(&self) -> Option<&T> {
        match self {
            LiveEvent::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// 地理围栏通知
///
/// ```json
/// {"command":"set","group":"5c5...","detect":"enter","hook":"","key":"fleet",
///  "time":"2024-01-01T00:00:00Z","id":"truck1","object":{"type":"Point","coordinates":[-112.27,33.46]}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub command: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub detect: Option<String>,
    #[serde(default)]
    pub hook: Option<String>,
    pub key: String,
    #[serde(default)]
    pub time: Option<String>,
    pub id: String,
    #[serde(default)]
    pub object: Option<serde_json::Value>,
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
    /// ROAM 检测到的靠近对象
    #[serde(default)]
    pub nearby: Option<serde_json::Value>,
    /// ROAM 检测到的远离对象
    #[serde(default)]
    pub faraway: Option<serde_json::Value>,
}

impl GeofenceEvent {
    /// 对象的 GeoJSON 几何
    pub fn geometry(&self) -> Option<geojson::Geometry> {
        let object = self.object.as_ref()?;
        serde_json::from_value(object.clone()).ok()
    }
}
