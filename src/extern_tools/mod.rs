pub mod tina;

use rustc_hash::FxHashSet;

/// TINA 的 ANAME 只接受字母数字与 `_`, 其余字符丢弃.
pub fn normalize_name_for_tina(name: &str) -> String {
    name.replace("::", "")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// 为一组名字分配互不相同的 TINA 名. 规范化后为空或重复的名字追加序号.
pub fn unique_tina_names(names: &[String], fallback: &str) -> Vec<String> {
    let mut used = FxHashSet::default();
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut candidate = normalize_name_for_tina(name);
            if candidate.is_empty() {
                candidate = format!("{}{}", fallback, idx);
            }
            let base = candidate.clone();
            let mut suffix = 1;
            while !used.insert(candidate.clone()) {
                suffix += 1;
                candidate = format!("{}_{}", base, suffix);
            }
            candidate
        })
        .collect()
}
