//! The declarative table of the 41 MIC/DTA boxes.
//!
//! One row per box: data key, bilingual caption, rectangle on the 1700×2800 px
//! canvas, default literal, stored length limit and renderer category. Both
//! persistence and the PDF painter read from here so the two never disagree.

use serde::Serialize;

/// Rectangle in layout pixels, origin at the top-left corner of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PxRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

const fn rect(x: f32, y: f32, w: f32, h: f32) -> PxRect {
    PxRect { x, y, w, h }
}

/// How the renderer treats a box's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    /// Boxes 1 and 9: the carrier block, printed large.
    Carrier,
    /// Boxes 33–35: sender, recipient and consignee blocks.
    Party,
    /// Boxes 36, 37 and 40: free-form notes in small type.
    Notes,
    /// Box 38: goods description, the longest text on the form.
    Description,
    /// Everything else: one line, truncated when too wide.
    Short,
    /// Box 39: legal declaration and carrier signature.
    Signature,
    /// Box 41: left blank for the customs stamp.
    Stamp,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub number: u8,
    /// JSON key of the value in `ManifestFields`; `None` for boxes without data.
    pub key: Option<&'static str>,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub rect: PxRect,
    /// Printed and stored when the value is blank.
    pub default: &'static str,
    /// Maximum stored length in characters; `None` means unbounded.
    pub max_len: Option<usize>,
    pub numeric: bool,
    pub category: FieldCategory,
}

macro_rules! field {
    ($n:expr, $key:expr, $title:expr, $subtitle:expr, ($x:expr, $y:expr, $w:expr, $h:expr),
     $default:expr, $max:expr, $numeric:expr, $cat:ident) => {
        FieldSpec {
            number: $n,
            key: $key,
            title: $title,
            subtitle: $subtitle,
            rect: rect($x as f32, $y as f32, $w as f32, $h as f32),
            default: $default,
            max_len: $max,
            numeric: $numeric,
            category: FieldCategory::$cat,
        }
    };
}

pub const FILLER: &str = "******";
pub const DEFAULT_STATUS: &str = "PROVISORIO";
pub const DEFAULT_SHEET: &str = "1 / 1";
pub const DEFAULT_TOWING_CAPACITY: &str = "45 TON";
pub const DEFAULT_CURRENCY: &str = "DOLAR AMERICANO";
pub const DEFAULT_ORIGIN: &str = "520-PARAGUAY";

pub static FIELDS: [FieldSpec; 41] = [
    field!(1, Some("carrier"), "1 Nombre y domicilio del porteador", "Nome e endereço do transportador",
        (55, 162, 863, 450), "", Some(150), false, Carrier),
    field!(2, Some("carrier_tax_id"), "2 Rol de contribuyente", "Cadastro geral de contribuintes",
        (55, 610, 861, 142), "", Some(30), false, Short),
    field!(3, Some("customs_transit"), "3 Tránsito aduanero", "Trânsito aduaneiro",
        (916, 162, 389, 169), "", Some(150), false, Short),
    field!(4, Some("status"), "4 Nº", "",
        (1305, 162, 365, 167), DEFAULT_STATUS, Some(30), false, Short),
    field!(5, Some("sheet"), "5 Hoja / Folha", "",
        (916, 330, 388, 115), DEFAULT_SHEET, Some(20), false, Short),
    field!(6, Some("issue_date"), "6 Fecha de emisión", "Data de emissão",
        (1305, 330, 365, 115), "", None, false, Short),
    field!(7, Some("departure_customs"), "7 Aduana, ciudad y país de partida", "Alfândega, cidade e país de partida",
        (916, 445, 752, 166), "", Some(100), false, Short),
    field!(8, Some("destination"), "8 Ciudad y país de destino final", "Cidade e país de destino final",
        (916, 610, 752, 142), "", Some(100), false, Short),
    field!(9, Some("vehicle_owner"), "9 CAMION ORIGINAL: Nombre y domicilio del propietario",
        "CAMINHÃO ORIGINAL: Nome e endereço do proprietário",
        (55, 750, 861, 165), "", Some(200), false, Carrier),
    field!(10, Some("owner_tax_id"), "10 Rol de contribuyente", "Cadastro geral de",
        (55, 915, 417, 142), "", Some(30), false, Short),
    field!(11, Some("truck_plate"), "11 Placa de camión", "Placa do caminhão",
        (470, 915, 445, 142), "", Some(20), false, Short),
    field!(12, Some("truck_make"), "12 Marca y número", "Marca e número",
        (55, 1055, 417, 142), "", Some(80), false, Short),
    field!(13, Some("towing_capacity"), "13 Capacidad de arrastre", "Capacidade de tração (t)",
        (470, 1055, 445, 142), DEFAULT_TOWING_CAPACITY, Some(10), false, Short),
    field!(14, Some("truck_year"), "14 AÑO", "ANO",
        (55, 1197, 417, 135), "", Some(10), false, Short),
    field!(15, Some("trailer_plate"), "15 Semirremolque / Remolque", "Semi-reboque / Reboque",
        (470, 1197, 445, 135), "", Some(20), false, Short),
    field!(16, Some("substitute_owner"), "16 CAMION SUSTITUTO: Nombre y domicilio del",
        "CAMINHÃO SUBSTITUTO: Nome e endereço do",
        (915, 752, 753, 163), FILLER, Some(20), false, Short),
    field!(17, Some("substitute_tax_id"), "17 Rol de contribuyente", "Cadastro geral de",
        (915, 915, 395, 140), FILLER, Some(20), false, Short),
    field!(18, Some("substitute_plate"), "18 Placa del camión", "Placa do",
        (1310, 915, 360, 140), FILLER, Some(20), false, Short),
    field!(19, Some("substitute_make"), "19 Marca y número", "Marca e número",
        (915, 1055, 395, 140), FILLER, Some(20), false, Short),
    field!(20, Some("substitute_capacity"), "20 Capacidad de arrastre", "Capacidade de tração",
        (1310, 1055, 360, 140), FILLER, Some(20), false, Short),
    field!(21, Some("substitute_year"), "21 AÑO", "ANO",
        (915, 1195, 395, 135), FILLER, Some(20), false, Short),
    field!(22, Some("substitute_trailer"), "22 Semirremolque / Remolque", "Semi-reboque / Reboque",
        (1310, 1195, 360, 135), FILLER, Some(20), false, Short),
    field!(23, Some("waybill_number"), "23 Nº carta de porte", "Nº do conhecimento",
        (55, 1330, 313, 154), "", Some(30), false, Short),
    field!(24, Some("destination_customs"), "24 Aduana de destino", "Alfândega de destino",
        (366, 1330, 550, 154), "", Some(100), false, Short),
    field!(25, Some("currency"), "25 Moneda", "Moeda",
        (55, 1482, 313, 136), DEFAULT_CURRENCY, Some(30), false, Short),
    field!(26, Some("goods_origin"), "26 Origen de las mercaderías", "Origem das mercadorias",
        (366, 1482, 550, 136), DEFAULT_ORIGIN, Some(30), false, Short),
    field!(27, Some("fot_value"), "27 Valor FOT", "Valor FOT",
        (55, 1618, 313, 136), "", None, true, Short),
    field!(28, Some("freight_usd"), "28 Flete en U$S", "Flete em U$S",
        (366, 1618, 275, 136), "", None, true, Short),
    field!(29, Some("insurance_usd"), "29 Seguro en U$S", "Seguro em U$S",
        (641, 1618, 275, 136), "", None, true, Short),
    field!(30, Some("package_type"), "30 Tipo de Bultos", "Tipo dos volumes",
        (55, 1754, 313, 119), "", Some(30), false, Short),
    field!(31, Some("package_count"), "31 Cantidad de", "Quantidade de",
        (366, 1754, 275, 119), "", None, true, Short),
    field!(32, Some("gross_weight"), "32 Peso bruto", "Peso bruto",
        (641, 1754, 275, 119), "", None, true, Short),
    field!(33, Some("sender"), "33 Remitente", "Remetente",
        (915, 1330, 753, 154), "", Some(200), false, Party),
    field!(34, Some("recipient"), "34 Destinatario", "Destinatario",
        (915, 1482, 753, 136), "", Some(200), false, Party),
    field!(35, Some("consignee"), "35 Consignatario", "Consignatário",
        (915, 1618, 753, 136), "", Some(200), false, Party),
    field!(36, Some("attached_documents"), "36 Documentos anexos", "Documentos anexos",
        (915, 1754, 753, 250), "", Some(100), false, Notes),
    field!(37, Some("seals"), "37 Número de precintos", "Número dos lacres",
        (55, 1873, 861, 131), "", Some(100), false, Notes),
    field!(38, Some("goods_description"),
        "38 Marcas y números de los bultos, descripción de las mercaderías",
        "Marcas e números dos volumes, descrição das mercadorias",
        (55, 2004, 1613, 222), "", Some(1500), false, Description),
    field!(39, None, "", "",
        (55, 2226, 838, 498), "", None, false, Signature),
    field!(40, Some("dta_route"), "40 Nº DTA, ruta y plazo de transporte", "Nº DTA, rota e prazo de transporte",
        (891, 2226, 780, 326), "", Some(200), false, Notes),
    field!(41, None, "41 Firma y sello de la Aduana de Partida", "Assinatura e carimbo de Alfândega de",
        (891, 2552, 780, 175), "", None, false, Stamp),
];

/// Looks a box up by number (1–41).
pub fn field(number: u8) -> Option<&'static FieldSpec> {
    match number {
        1..=41 => Some(&FIELDS[usize::from(number) - 1]),
        _ => None,
    }
}

/// The value to print and store for a box: the trimmed value, or the box
/// default when the value is blank.
pub fn apply_default(number: u8, value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.to_string(),
        None => field(number).map(|f| f.default).unwrap_or("").to_string(),
    }
}

/// Cuts `value` to the box's stored length limit, on a char boundary.
pub fn clamp_len(number: u8, value: &str) -> String {
    match field(number).and_then(|f| f.max_len) {
        Some(max) if value.chars().count() > max => value.chars().take(max).collect(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_ordered_by_box_number() {
        for (i, spec) in FIELDS.iter().enumerate() {
            assert_eq!(usize::from(spec.number), i + 1);
        }
        assert!(field(0).is_none());
        assert!(field(42).is_none());
    }

    #[test]
    fn test_keys_are_unique() {
        let mut keys: Vec<&str> = FIELDS.iter().filter_map(|f| f.key).collect();
        let before = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), before);
        assert_eq!(FIELDS[37].key, Some("goods_description"));
    }

    #[test]
    fn test_defaults() {
        for n in 16..=22 {
            assert_eq!(apply_default(n, None), "******");
            assert_eq!(apply_default(n, Some("   ")), "******");
        }
        assert_eq!(apply_default(13, Some("")), "45 TON");
        assert_eq!(apply_default(4, None), "PROVISORIO");
        assert_eq!(apply_default(5, None), "1 / 1");
        assert_eq!(apply_default(25, None), "DOLAR AMERICANO");
        assert_eq!(apply_default(26, None), "520-PARAGUAY");
        assert_eq!(apply_default(2, None), "");
        assert_eq!(apply_default(13, Some(" 30 TON ")), "30 TON");
    }

    #[test]
    fn test_clamp_len_counts_chars_not_bytes() {
        let long = "ñ".repeat(40);
        assert_eq!(clamp_len(11, &long).chars().count(), 20);
        assert_eq!(clamp_len(38, "corto"), "corto");
        // Numeric boxes are not length-limited.
        assert_eq!(clamp_len(27, &"9".repeat(60)).len(), 60);
    }

    #[test]
    fn test_reference_geometry() {
        let desc = field(38).unwrap();
        assert_eq!(desc.rect, rect(55.0, 2004.0, 1613.0, 222.0));
        assert_eq!(desc.category, FieldCategory::Description);
        assert_eq!(field(39).unwrap().key, None);
        assert_eq!(field(41).unwrap().category, FieldCategory::Stamp);
    }
}
