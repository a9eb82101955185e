use std::fs;
use std::path::PathBuf;

use provodka::core::{ErrorKind, LegalForm};
use provodka::upd;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const META_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<DocFlowDescription xmlns="http://api-invoice.taxcom.ru/meta">
  <DocFlow Id="df-001"/>
  <Documents>
    <MainImage Path="1/upd_body.xml"/>
    <ExternalCard Path="1/card.xml"/>
  </Documents>
</DocFlowDescription>"#;

const CARD_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Card xmlns="http://api-invoice.taxcom.ru/card">
  <Identifiers ExternalIdentifier="ext-123"/>
  <Description Title="УПД № 77" Date="2024-02-01T10:30:00"/>
  <Sender>
    <Abonent Inn="7700000000" Kpp="770001001" Name="ООО Ромашка"/>
  </Sender>
</Card>"#;

const BODY_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Файл ВерсФорм="5.03">
  <Документ>
    <СвСчФакт НомерДок="77" ДатаДок="01.02.2024" КодОКВ="643">
      <СвПрод>
        <ИдСв><СвЮЛУч НаимОрг="ООО Ромашка" ИННЮЛ="7700000000" КПП="770001001"/></ИдСв>
      </СвПрод>
      <ГрузПолуч>
        <ИдСв><СвИП ИННФЛ="500100200012"><ФИО Фамилия="Иванов" Имя="Пётр"/></СвИП></ИдСв>
      </ГрузПолуч>
    </СвСчФакт>
    <ТаблСчФакт>
      <СведТов НаимТов="Профиль 60х27" КолТов="2" ЦенаТов="100" СтТовБезНДС="200" НалСт="20%" СтТовУчНал="240">
        <ДопСведТов КодТов="PR-60"/>
        <СумНал><СумНал>40</СумНал></СумНал>
      </СведТов>
      <СведТов НаимТов="Труба 20х20" КолТов="1" ЦенаТов="500" СтТовБезНДС="500" НалСт="20%" СтТовУчНал="600">
        <СумНал><СумНал>100</СумНал></СумНал>
      </СведТов>
    </ТаблСчФакт>
    <СвПродПер><СвПер><ОснПер РеквНомерДок="счет № 4512 от 20.01.2024"/></СвПер></СвПродПер>
    <ВсегоОпл СтТовБезНДСВсего="700" СтТовУчНалВсего="840">
      <СумНалВсего><СумНал>140</СумНал></СумНалВсего>
    </ВсегоОпл>
  </Документ>
</Файл>"#;

/// Materialize archive contents as an extracted directory.
fn write_dir(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("provodka-upd-{}", uuid::Uuid::new_v4()));
    for (name, contents) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn standard_dir() -> PathBuf {
    write_dir(&[
        ("meta.xml", META_XML),
        ("1/card.xml", CARD_XML),
        ("1/upd_body.xml", BODY_XML),
    ])
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn parses_complete_upd() {
    let dir = standard_dir();
    let doc = upd::parse(&dir).unwrap();

    assert_eq!(doc.meta.doc_flow_id, "df-001");
    assert_eq!(doc.document_id(), "ext-123");
    assert_eq!(doc.card.sender_inn.as_deref(), Some("7700000000"));

    let header = &doc.header;
    assert_eq!(header.number, "77");
    assert_eq!(header.date.format("%d.%m.%Y").to_string(), "01.02.2024");
    assert_eq!(header.currency_code, "643");
    assert_eq!(header.requisite_number.as_deref(), Some("4512"));

    assert_eq!(header.seller.inn, "7700000000");
    assert_eq!(header.seller.kpp.as_deref(), Some("770001001"));
    assert_eq!(header.seller.legal_form, LegalForm::LegalEntity);

    assert_eq!(header.buyer.inn, "500100200012");
    assert_eq!(header.buyer.kpp, None);
    assert_eq!(header.buyer.legal_form, LegalForm::SoleProprietor);
    assert_eq!(header.buyer.name, "Иванов Пётр");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn item_sequence_and_totals_are_consistent() {
    let dir = standard_dir();
    let header = upd::parse(&dir).unwrap().header;

    assert_eq!(header.items.len(), 2);
    let first = &header.items[0];
    assert_eq!(first.name, "Профиль 60х27");
    assert_eq!(first.article.as_deref(), Some("PR-60"));
    assert_eq!(first.quantity, dec!(2));
    assert_eq!(first.price, dec!(100));
    assert_eq!(first.vat_amount, dec!(40));
    assert_eq!(first.total, dec!(240));

    let line_sum: rust_decimal::Decimal = header.items.iter().map(|i| i.total).sum();
    assert!((header.total - line_sum).abs() <= dec!(0.01));
    assert_eq!(header.total, dec!(840));
    assert_eq!(header.total_vat, dec!(140));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn number_and_date_fall_back_to_child_elements() {
    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<Файл>
  <СвСчФакт>
    <НомерСчФ>88</НомерСчФ>
    <ДатаСчФ>2024-03-05</ДатаСчФ>
    <СвПрод><СвЮЛУч НаимОрг="ООО Ромашка" ИННЮЛ="7700000000" КПП="770001001"/></СвПрод>
    <СвПокуп><СвЮЛУч НаимОрг="АО Вектор" ИННЮЛ="5001002003" КПП="500101001"/></СвПокуп>
  </СвСчФакт>
  <ТаблСчФакт>
    <СведТов НаимТов="Труба 40х40" КолТов="1" ЦенаТов="300" СтТовБезНДС="300" СтТовУчНал="360">
      <СумНал><СумНал>60</СумНал></СумНал>
    </СведТов>
  </ТаблСчФакт>
</Файл>"#;
    let dir = write_dir(&[
        ("meta.xml", META_XML),
        ("1/card.xml", CARD_XML),
        ("1/upd_body.xml", body),
    ]);
    let header = upd::parse(&dir).unwrap().header;
    assert_eq!(header.number, "88");
    assert_eq!(header.date.format("%Y-%m-%d").to_string(), "2024-03-05");
    // No ВсегоОпл element — totals come from the lines.
    assert_eq!(header.total, dec!(360));
    // No ОснПер — no requisite number.
    assert_eq!(header.requisite_number, None);
    fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn missing_meta_xml_fails() {
    let dir = write_dir(&[("1/card.xml", CARD_XML), ("1/upd_body.xml", BODY_XML)]);
    let err = upd::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_body_file_fails() {
    let dir = write_dir(&[("meta.xml", META_XML), ("1/card.xml", CARD_XML)]);
    let err = upd::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn malformed_quantity_fails_with_parsing_error() {
    let body = BODY_XML.replace("КолТов=\"2\"", "КолТов=\"abc\"");
    let dir = write_dir(&[
        ("meta.xml", META_XML),
        ("1/card.xml", CARD_XML),
        ("1/upd_body.xml", &body),
    ]);
    let err = upd::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert!(err.to_string().contains("КолТов"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_seller_inn_fails() {
    let body = BODY_XML.replace(" ИННЮЛ=\"7700000000\"", "");
    let dir = write_dir(&[
        ("meta.xml", META_XML),
        ("1/card.xml", CARD_XML),
        ("1/upd_body.xml", &body),
    ]);
    let err = upd::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn empty_tabular_part_fails() {
    let body = r#"<Файл>
  <СвСчФакт НомерДок="9" ДатаДок="01.02.2024">
    <СвПрод><СвЮЛУч НаимОрг="ООО Ромашка" ИННЮЛ="7700000000" КПП="770001001"/></СвПрод>
    <СвПокуп><СвЮЛУч НаимОрг="АО Вектор" ИННЮЛ="5001002003" КПП="500101001"/></СвПокуп>
  </СвСчФакт>
  <ТаблСчФакт/>
</Файл>"#;
    let dir = write_dir(&[
        ("meta.xml", META_XML),
        ("1/card.xml", CARD_XML),
        ("1/upd_body.xml", body),
    ]);
    let err = upd::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn comma_decimal_separator_in_amounts() {
    let body = BODY_XML
        .replace("ЦенаТов=\"100\"", "ЦенаТов=\"100,00\"")
        .replace("СтТовБезНДС=\"200\"", "СтТовБезНДС=\"200,00\"");
    let dir = write_dir(&[
        ("meta.xml", META_XML),
        ("1/card.xml", CARD_XML),
        ("1/upd_body.xml", &body),
    ]);
    let header = upd::parse(&dir).unwrap().header;
    assert_eq!(header.items[0].price, dec!(100));
    assert_eq!(header.items[0].amount, dec!(200));
    fs::remove_dir_all(&dir).ok();
}
