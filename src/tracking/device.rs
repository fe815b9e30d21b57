use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Bot,
    Tablet,
    Mobile,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Bot => "bot",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Mobile => "mobile",
            DeviceClass::Desktop => "desktop",
        }
    }
}

const BOT_MARKERS: &[&str] = &[
    "bot", "crawler", "spider", "slurp", "facebookexternalhit", "preview", "headless",
    "curl/", "wget/", "python-requests", "lighthouse",
];

const TABLET_MARKERS: &[&str] = &["ipad", "tablet", "kindle", "silk/", "playbook"];

const MOBILE_MARKERS: &[&str] = &[
    "mobi", "iphone", "ipod", "android", "blackberry", "opera mini", "windows phone", "iemobile",
];

/// Classifies a `User-Agent` header. Order matters: bots first, then
/// tablets (Android tablets omit "mobile"), then phones.
pub fn classify(user_agent: Option<&str>) -> DeviceClass {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return DeviceClass::Bot;
    };
    let ua = ua.to_lowercase();

    if BOT_MARKERS.iter().any(|m| ua.contains(m)) {
        return DeviceClass::Bot;
    }
    if TABLET_MARKERS.iter().any(|m| ua.contains(m))
        || (ua.contains("android") && !ua.contains("mobile"))
    {
        return DeviceClass::Tablet;
    }
    if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
        return DeviceClass::Mobile;
    }
    DeviceClass::Desktop
}
