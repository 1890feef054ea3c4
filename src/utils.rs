pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }

    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        out.push_str(&rest[..start]);
        rest = &rest[start + 3..];
        let tag = rest.get(..4).unwrap_or_default();
        if tag.eq_ignore_ascii_case("json") {
            rest = &rest[4..];
        }
        rest = rest.trim_start();
    }
    out.push_str(rest);

    out.trim().to_string()
}

pub fn strip_data_url(image: &str) -> &str {
    if image.starts_with("data:") {
        image.split_once(',').map(|(_, data)| data).unwrap_or("")
    } else {
        image
    }
}
