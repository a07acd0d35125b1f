//! # CIF 格式读写
//!
//! 只实现恢复晶格、不对称单元和对称操作所需的 CIF 1.1 子集：
//! 数据块 (`data_`)、单值数据项、`loop_` 表、引号字符串和 `;` 文本域。
//!
//! ## 读取流程
//! ```text
//! 文本 ──tokenize──> Token 流 ──parse_blocks──> CifBlock[]
//!      ──block_to_crystal──> 应用对称操作展开，周期去重 ──> Crystal[]
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 和 `commands/primitive.rs` 使用
//! - 使用 `models/structure.rs`，对称操作用 `nalgebra` 表示

use crate::error::{XtalkitError, Result};
use crate::models::{wrap_fractional, Atom, Crystal, Lattice};
use nalgebra::{Matrix3, Vector3};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 对称展开后判定两个位点重合的分数坐标容差
const SITE_TOLERANCE: f64 = 1e-3;

/// 读取 CIF 文件中的全部结构（每个含原子位点的数据块一个）
pub fn parse_cif_file(path: &Path) -> Result<Vec<Crystal>> {
    let content = fs::read_to_string(path).map_err(|e| XtalkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_cif_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 CIF，`origin` 仅用于错误信息
pub fn parse_cif_content(content: &str, origin: &str) -> Result<Vec<Crystal>> {
    let tokens = tokenize(content);
    let blocks = parse_blocks(&tokens).map_err(|reason| cif_error(origin, reason))?;

    let crystals = blocks
        .iter()
        .filter(|block| block.atom_site_loop().is_some())
        .map(|block| block_to_crystal(block, origin))
        .collect::<Result<Vec<_>>>()?;

    if crystals.is_empty() {
        return Err(cif_error(origin, "No data block with an _atom_site loop"));
    }

    Ok(crystals)
}

fn cif_error(origin: &str, reason: impl Into<String>) -> XtalkitError {
    XtalkitError::ParseError {
        format: "cif".to_string(),
        path: origin.to_string(),
        reason: reason.into(),
    }
}

// ─────────────────────────────────────────────────────────────
// 词法
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Bare(String),
    Quoted(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Bare(s) | Token::Quoted(s) => s,
        }
    }

    /// 保留字：数据名、`loop_`、`data_` 等，不能作为值
    fn is_reserved(&self) -> bool {
        match self {
            Token::Quoted(_) => false,
            Token::Bare(word) => {
                let lower = word.to_lowercase();
                word.starts_with('_')
                    || lower == "loop_"
                    || lower == "global_"
                    || lower == "stop_"
                    || lower.starts_with("data_")
                    || lower.starts_with("save_")
            }
        }
    }
}

fn tokenize(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        if let Some(first) = line.strip_prefix(';') {
            let mut text = first.to_string();
            for next in lines.by_ref() {
                if next.starts_with(';') {
                    break;
                }
                text.push('\n');
                text.push_str(next);
            }
            tokens.push(Token::Quoted(text.trim().to_string()));
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if c == '#' {
                break;
            }
            if c == '\'' || c == '"' {
                // 引号仅在其后为空白或行尾时闭合
                let mut j = i + 1;
                while j < chars.len()
                    && !(chars[j] == c && chars.get(j + 1).map_or(true, |n| n.is_whitespace()))
                {
                    j += 1;
                }
                tokens.push(Token::Quoted(chars[i + 1..j].iter().collect()));
                i = j + 1;
                continue;
            }
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(Token::Bare(chars[start..i].iter().collect()));
        }
    }

    tokens
}

// ─────────────────────────────────────────────────────────────
// 语法：数据块与 loop_
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CifLoop {
    tags: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CifLoop {
    fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }
}

#[derive(Debug, Default)]
struct CifBlock {
    name: String,
    items: HashMap<String, String>,
    loops: Vec<CifLoop>,
}

impl CifBlock {
    fn number(&self, tag: &str) -> Option<f64> {
        self.items.get(tag).and_then(|v| parse_number(v))
    }

    fn find_loop(&self, tag: &str) -> Option<&CifLoop> {
        self.loops.iter().find(|l| l.column(tag).is_some())
    }

    fn atom_site_loop(&self) -> Option<&CifLoop> {
        self.find_loop("_atom_site_fract_x")
            .or_else(|| self.find_loop("_atom_site_cartn_x"))
    }
}

fn parse_blocks(tokens: &[Token]) -> std::result::Result<Vec<CifBlock>, String> {
    let mut blocks: Vec<CifBlock> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        let word = token.text();
        let lower = word.to_lowercase();

        match token {
            Token::Bare(_) if lower.starts_with("data_") => {
                blocks.push(CifBlock {
                    name: word[5..].to_string(),
                    ..Default::default()
                });
                i += 1;
            }
            Token::Bare(_) if lower == "loop_" => {
                i += 1;
                let mut tags = Vec::new();
                while let Some(Token::Bare(tag)) = tokens.get(i) {
                    if !tag.starts_with('_') {
                        break;
                    }
                    tags.push(tag.to_lowercase());
                    i += 1;
                }
                if tags.is_empty() {
                    return Err("loop_ without data names".to_string());
                }

                let mut values = Vec::new();
                while let Some(value) = tokens.get(i).filter(|t| !t.is_reserved()) {
                    values.push(value.text().to_string());
                    i += 1;
                }
                if values.len() % tags.len() != 0 {
                    return Err(format!(
                        "loop_ starting with {} has {} values for {} data names",
                        tags[0],
                        values.len(),
                        tags.len()
                    ));
                }

                let rows = values.chunks(tags.len()).map(|c| c.to_vec()).collect();
                current_block(&mut blocks, &tags[0])?
                    .loops
                    .push(CifLoop { tags, rows });
            }
            Token::Bare(_) if word.starts_with('_') => {
                let value = tokens
                    .get(i + 1)
                    .filter(|t| !t.is_reserved())
                    .ok_or_else(|| format!("Data name {} has no value", word))?;
                current_block(&mut blocks, word)?
                    .items
                    .insert(lower, value.text().to_string());
                i += 2;
            }
            Token::Bare(_)
                if lower.starts_with("save_") || lower == "global_" || lower == "stop_" =>
            {
                i += 1;
            }
            _ => return Err(format!("Unexpected value '{}'", word)),
        }
    }

    Ok(blocks)
}

fn current_block<'a>(
    blocks: &'a mut [CifBlock],
    tag: &str,
) -> std::result::Result<&'a mut CifBlock, String> {
    blocks
        .last_mut()
        .ok_or_else(|| format!("{} appears before any data_ block", tag))
}

/// 解析数值，去掉标准不确定度 `5.431(2)`；`?` 和 `.` 视为缺失
fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.split('(').next()?.trim();
    if value.is_empty() || value == "?" || value == "." {
        return None;
    }
    value.parse().ok()
}

// ─────────────────────────────────────────────────────────────
// 对称操作
// ─────────────────────────────────────────────────────────────

/// 分数坐标下的对称操作 x' = R x + t
#[derive(Debug, Clone, PartialEq)]
pub struct SymOp {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl SymOp {
    pub fn identity() -> Self {
        SymOp {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// 解析 `-y+1/2, x-y, z+0.25` 形式的操作
    pub fn parse(op: &str) -> std::result::Result<Self, String> {
        let components: Vec<&str> = op.split(',').collect();
        if components.len() != 3 {
            return Err(format!("Symmetry operation '{}' needs 3 components", op));
        }

        let mut rotation = Matrix3::zeros();
        let mut translation = Vector3::zeros();
        for (row, component) in components.iter().enumerate() {
            let (coeffs, shift) = parse_component(component)
                .map_err(|e| format!("Symmetry operation '{}': {}", op, e))?;
            for (col, coeff) in coeffs.iter().enumerate() {
                rotation[(row, col)] = *coeff;
            }
            translation[row] = shift;
        }

        Ok(SymOp {
            rotation,
            translation,
        })
    }

    pub fn apply(&self, position: [f64; 3]) -> [f64; 3] {
        let p = self.rotation * Vector3::new(position[0], position[1], position[2])
            + self.translation;
        [p.x, p.y, p.z]
    }
}

fn parse_component(expr: &str) -> std::result::Result<([f64; 3], f64), String> {
    let compact: String = expr
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if compact.is_empty() {
        return Err("empty component".to_string());
    }

    let mut terms: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in compact.chars() {
        if (c == '+' || c == '-') && !current.is_empty() {
            terms.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    terms.push(current);

    let mut coeffs = [0.0; 3];
    let mut shift = 0.0;
    for term in &terms {
        let (sign, body) = match term.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, term.strip_prefix('+').unwrap_or(term)),
        };

        match body.chars().last().and_then(|c| "xyz".find(c)) {
            Some(axis) => {
                let factor = body[..body.len() - 1].trim_end_matches('*');
                let factor = if factor.is_empty() {
                    1.0
                } else {
                    parse_fraction(factor)?
                };
                coeffs[axis] += sign * factor;
            }
            None => shift += sign * parse_fraction(body)?,
        }
    }

    Ok((coeffs, shift))
}

fn parse_fraction(s: &str) -> std::result::Result<f64, String> {
    let bad = || format!("invalid term '{}'", s);
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().map_err(|_| bad())?;
            let den: f64 = den.parse().map_err(|_| bad())?;
            if den == 0.0 {
                return Err(bad());
            }
            Ok(num / den)
        }
        None => s.parse().map_err(|_| bad()),
    }
}

fn symmetry_operations(block: &CifBlock, origin: &str) -> Result<Vec<SymOp>> {
    let tags = [
        "_symmetry_equiv_pos_as_xyz",
        "_space_group_symop_operation_xyz",
    ];

    for tag in tags {
        if let Some(table) = block.find_loop(tag) {
            let col = table.column(tag).unwrap_or(0);
            return table
                .rows
                .iter()
                .map(|row| SymOp::parse(&row[col]).map_err(|e| cif_error(origin, e)))
                .collect();
        }
        if let Some(single) = block.items.get(tag) {
            return Ok(vec![SymOp::parse(single).map_err(|e| cif_error(origin, e))?]);
        }
    }

    Ok(vec![SymOp::identity()])
}

// ─────────────────────────────────────────────────────────────
// 原子位点
// ─────────────────────────────────────────────────────────────

/// 不对称单元中的一个位点
struct CifSite {
    label: String,
    element: String,
    position: [f64; 3],
}

/// 从 `Cu1`、`O2-`、`Fe3+` 中提取元素符号
fn element_symbol(raw: &str) -> Option<String> {
    let letters: Vec<char> = raw
        .chars()
        .skip_while(|c| !c.is_ascii_alphabetic())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    let mut symbol = letters.first()?.to_ascii_uppercase().to_string();
    if let Some(second) = letters.get(1).filter(|c| c.is_ascii_lowercase()) {
        symbol.push(*second);
    }
    Some(symbol)
}

fn atom_sites(block: &CifBlock, lattice: &Lattice, origin: &str) -> Result<Vec<CifSite>> {
    let table = block
        .atom_site_loop()
        .ok_or_else(|| cif_error(origin, "Missing _atom_site loop"))?;

    let (axes, cartesian) = match table.column("_atom_site_fract_x") {
        Some(_) => (
            ["_atom_site_fract_x", "_atom_site_fract_y", "_atom_site_fract_z"],
            false,
        ),
        None => (
            ["_atom_site_cartn_x", "_atom_site_cartn_y", "_atom_site_cartn_z"],
            true,
        ),
    };
    let columns = axes
        .iter()
        .map(|tag| {
            table
                .column(tag)
                .ok_or_else(|| cif_error(origin, format!("Missing {}", tag)))
        })
        .collect::<Result<Vec<_>>>()?;
    let label_col = table.column("_atom_site_label");
    let type_col = table.column("_atom_site_type_symbol");

    table
        .rows
        .iter()
        .enumerate()
        .map(|(n, row)| -> Result<CifSite> {
            let mut coords = [0.0; 3];
            for (axis, &col) in columns.iter().enumerate() {
                coords[axis] = parse_number(&row[col]).ok_or_else(|| {
                    cif_error(origin, format!("Invalid coordinate '{}' in atom site {}", row[col], n + 1))
                })?;
            }
            let position = if cartesian {
                lattice
                    .cart_to_frac(coords)
                    .ok_or_else(|| cif_error(origin, "Singular lattice"))?
            } else {
                coords
            };

            let label = label_col.map(|c| row[c].clone());
            let element = type_col
                .and_then(|c| element_symbol(&row[c]))
                .or_else(|| label.as_deref().and_then(element_symbol))
                .ok_or_else(|| {
                    cif_error(origin, format!("Cannot determine element of atom site {}", n + 1))
                })?;

            Ok(CifSite {
                label: label.unwrap_or_else(|| format!("{}{}", element, n + 1)),
                element,
                position,
            })
        })
        .collect()
}

/// 周期边界下两个分数坐标是否重合
fn periodic_close(a: [f64; 3], b: [f64; 3]) -> bool {
    (0..3).all(|k| {
        let d = a[k] - b[k];
        (d - d.round()).abs() < SITE_TOLERANCE
    })
}

fn block_to_crystal(block: &CifBlock, origin: &str) -> Result<Crystal> {
    let length = |tag: &str| {
        block
            .number(tag)
            .ok_or_else(|| cif_error(origin, format!("Missing or invalid {}", tag)))
    };
    let angle = |tag: &str| block.number(tag).unwrap_or(90.0);

    let lattice = Lattice::from_parameters(
        length("_cell_length_a")?,
        length("_cell_length_b")?,
        length("_cell_length_c")?,
        angle("_cell_angle_alpha"),
        angle("_cell_angle_beta"),
        angle("_cell_angle_gamma"),
    );

    let operations = symmetry_operations(block, origin)?;
    let sites = atom_sites(block, &lattice, origin)?;

    // 同元素的重合像点视为重复列出；不同元素落在同一位置（混占位）直接报错
    let mut atoms: Vec<Atom> = Vec::new();
    for site in &sites {
        for op in &operations {
            let position = op.apply(site.position).map(wrap_fractional);
            match atoms.iter().find(|a| periodic_close(a.position, position)) {
                None => atoms.push(
                    Atom::new(site.element.clone(), position).with_label(site.label.clone()),
                ),
                Some(existing) if existing.element == site.element => {}
                Some(existing) => {
                    return Err(cif_error(
                        origin,
                        format!(
                            "Atom sites {} ({}) and {} ({}) overlap; partial occupancy is not supported",
                            existing.label.as_deref().unwrap_or("?"),
                            existing.element,
                            site.label,
                            site.element
                        ),
                    ))
                }
            }
        }
    }

    let name = if block.name.is_empty() {
        "unknown".to_string()
    } else {
        block.name.clone()
    };

    let mut crystal = Crystal::new(name, lattice, atoms);
    crystal.space_group = [
        "_symmetry_space_group_name_h-m",
        "_space_group_name_h-m_alt",
    ]
    .iter()
    .find_map(|tag| block.items.get(*tag).cloned());
    crystal.source_format = Some("cif".to_string());

    Ok(crystal)
}

// ─────────────────────────────────────────────────────────────
// 写出
// ─────────────────────────────────────────────────────────────

/// 将 Crystal 写成 P1 CIF 字符串
pub fn to_cif_string(crystal: &Crystal) -> String {
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.parameters();
    let block_name: String = crystal
        .name
        .chars()
        .map(|ch| if ch.is_whitespace() { '_' } else { ch })
        .collect();

    let mut result = String::new();
    result.push_str("# generated by xtalkit\n");
    result.push_str(&format!("data_{}\n", block_name));
    result.push_str("_symmetry_space_group_name_H-M   'P 1'\n");
    result.push_str(&format!("_cell_length_a   {:.8}\n", a));
    result.push_str(&format!("_cell_length_b   {:.8}\n", b));
    result.push_str(&format!("_cell_length_c   {:.8}\n", c));
    result.push_str(&format!("_cell_angle_alpha   {:.8}\n", alpha));
    result.push_str(&format!("_cell_angle_beta   {:.8}\n", beta));
    result.push_str(&format!("_cell_angle_gamma   {:.8}\n", gamma));
    result.push_str("_symmetry_Int_Tables_number   1\n");
    result.push_str(&format!("_chemical_formula_sum   '{}'\n", crystal.formula()));
    result.push_str(&format!("_cell_volume   {:.8}\n", crystal.volume()));

    result.push_str("loop_\n");
    result.push_str(" _symmetry_equiv_pos_site_id\n");
    result.push_str(" _symmetry_equiv_pos_as_xyz\n");
    result.push_str("  1  'x, y, z'\n");

    result.push_str("loop_\n");
    result.push_str(" _atom_site_type_symbol\n");
    result.push_str(" _atom_site_label\n");
    result.push_str(" _atom_site_symmetry_multiplicity\n");
    result.push_str(" _atom_site_fract_x\n");
    result.push_str(" _atom_site_fract_y\n");
    result.push_str(" _atom_site_fract_z\n");
    result.push_str(" _atom_site_occupancy\n");

    let mut per_element: HashMap<&str, usize> = HashMap::new();
    for atom in &crystal.atoms {
        let index = per_element.entry(atom.element.as_str()).or_insert(0);
        result.push_str(&format!(
            "  {}  {}{}  1  {:.8}  {:.8}  {:.8}  1\n",
            atom.element, atom.element, index, atom.position[0], atom.position[1], atom.position[2]
        ));
        *index += 1;
    }

    result
}
