use std::fs;
use std::path::PathBuf;

use provodka::commerceml;
use provodka::core::{ErrorKind, LegalForm, OrgRole};
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const INVOICE_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<КоммерческаяИнформация xmlns="urn:1C.ru:commerceml_2">
  <Каталог>
    <Товары>
      <Товар>
        <Ид>tov-1</Ид>
        <Наименование>Профиль 60х27</Наименование>
        <Артикул>PR-60</Артикул>
        <ЗначенияРеквизитов>
          <ЗначениеРеквизита>
            <Наименование>Для1С_Идентификатор</Наименование>
            <Значение>##id-1##</Значение>
          </ЗначениеРеквизита>
        </ЗначенияРеквизитов>
      </Товар>
      <Товар>
        <Ид>tov-2</Ид>
        <Наименование>Труба 20х20</Наименование>
        <Артикул>TR-20</Артикул>
        <ЗначенияРеквизитов>
          <ЗначениеРеквизита>
            <Наименование>Для1С_Идентификатор</Наименование>
            <Значение>##id-2##</Значение>
          </ЗначениеРеквизита>
        </ЗначенияРеквизитов>
      </Товар>
    </Товары>
  </Каталог>
  <Документ>
    <Ид>doc-1</Ид>
    <Номер>4512</Номер>
    <Дата>2024-01-20</Дата>
    <Сумма>840</Сумма>
    <Контрагенты>
      <Контрагент>
        <Ид>7700000000_770001001</Ид>
        <Роль>Продавец</Роль>
        <Наименование>ООО Ромашка</Наименование>
      </Контрагент>
      <Контрагент>
        <Ид>500100200012</Ид>
        <Роль>Покупатель</Роль>
        <Наименование>ИП Иванов</Наименование>
      </Контрагент>
    </Контрагенты>
    <ТабличнаяЧасть>
      <СтрокаТабличнойЧасти>
        <Товар>id-1</Товар>
        <Количество>2</Количество>
        <Цена>100</Цена>
        <Сумма>200</Сумма>
        <СтавкаНДС>20</СтавкаНДС>
        <СуммаНДС>40</СуммаНДС>
        <Всего>240</Всего>
      </СтрокаТабличнойЧасти>
      <СтрокаТабличнойЧасти>
        <Товар>id-2</Товар>
        <Количество>1</Количество>
        <Цена>500</Цена>
        <Сумма>500</Сумма>
        <СтавкаНДС>20</СтавкаНДС>
        <СуммаНДС>100</СуммаНДС>
        <Всего>600</Всего>
      </СтрокаТабличнойЧасти>
    </ТабличнаяЧасть>
  </Документ>
</КоммерческаяИнформация>"#;

fn write_dir(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("provodka-cml-{}", uuid::Uuid::new_v4()));
    for (name, contents) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn parses_tabular_invoice() {
    let dir = write_dir(&[("1/schet_4512.xml", INVOICE_XML)]);
    let header = commerceml::parse(&dir).unwrap();

    assert_eq!(header.number, "4512");
    assert_eq!(header.date.format("%Y-%m-%d").to_string(), "2024-01-20");
    assert_eq!(header.total, dec!(840));

    assert_eq!(header.seller.role, OrgRole::Seller);
    assert_eq!(header.seller.inn, "7700000000");
    assert_eq!(header.seller.kpp.as_deref(), Some("770001001"));
    assert_eq!(header.seller.legal_form, LegalForm::LegalEntity);

    assert_eq!(header.buyer.inn, "500100200012");
    assert_eq!(header.buyer.legal_form, LegalForm::SoleProprietor);
    assert_eq!(header.buyer.kpp, None);

    assert_eq!(header.items.len(), 2);
    let first = &header.items[0];
    assert_eq!(first.name, "Профиль 60х27");
    assert_eq!(first.article.as_deref(), Some("PR-60"));
    assert_eq!(first.quantity, dec!(2));
    assert_eq!(first.total, dec!(240));
    let second = &header.items[1];
    assert_eq!(second.name, "Труба 20х20");
    assert_eq!(second.article.as_deref(), Some("TR-20"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn falls_back_to_catalog_products_without_tabular_part() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<КоммерческаяИнформация xmlns="urn:1C.ru:commerceml_2">
  <Каталог>
    <Товары>
      <Товар>
        <Ид>tov-1</Ид>
        <Наименование>Труба 40х40</Наименование>
        <Артикул>TR-40</Артикул>
        <ЦенаЗаЕдиницу>120</ЦенаЗаЕдиницу>
        <Количество>2</Количество>
        <Сумма>240</Сумма>
        <Налоги>
          <Налог>
            <Ставка>20</Ставка>
            <Сумма>40</Сумма>
          </Налог>
        </Налоги>
      </Товар>
    </Товары>
  </Каталог>
  <Документ>
    <Номер>900</Номер>
    <Дата>2024-05-10</Дата>
    <Сумма>240</Сумма>
    <Контрагенты>
      <Контрагент><Ид>7700000000_770001001</Ид><Роль>Продавец</Роль><Наименование>ООО Ромашка</Наименование></Контрагент>
      <Контрагент><Ид>5001002003_500101001</Ид><Роль>Покупатель</Роль><Наименование>АО Вектор</Наименование></Контрагент>
    </Контрагенты>
  </Документ>
</КоммерческаяИнформация>"#;
    let dir = write_dir(&[("schet.xml", xml)]);
    let header = commerceml::parse(&dir).unwrap();

    assert_eq!(header.items.len(), 1);
    let item = &header.items[0];
    assert_eq!(item.name, "Труба 40х40");
    // Сумма is gross here; the net amount and unit price are derived.
    assert_eq!(item.amount, dec!(200));
    assert_eq!(item.vat_amount, dec!(40));
    assert_eq!(item.total, dec!(240));
    assert_eq!(item.price, dec!(100));
    assert_eq!(item.vat_rate.as_deref(), Some("20%"));

    fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn archive_without_invoice_xml_fails() {
    let dir = write_dir(&[("meta.xml", "<a/>"), ("card.xml", "<b/>")]);
    let err = commerceml::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_number_fails() {
    let xml = INVOICE_XML.replace("<Номер>4512</Номер>", "");
    let dir = write_dir(&[("schet.xml", &xml)]);
    let err = commerceml::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn bad_date_format_fails() {
    let xml = INVOICE_XML.replace("<Дата>2024-01-20</Дата>", "<Дата>20.01.2024</Дата>");
    let dir = write_dir(&[("schet.xml", &xml)]);
    let err = commerceml::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_buyer_fails() {
    let xml = INVOICE_XML.replace("<Роль>Покупатель</Роль>", "<Роль>Грузополучатель</Роль>");
    let dir = write_dir(&[("schet.xml", &xml)]);
    let err = commerceml::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    assert!(err.to_string().contains("Покупатель"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn malformed_quantity_fails() {
    let xml = INVOICE_XML.replace("<Количество>2</Количество>", "<Количество>два</Количество>");
    let dir = write_dir(&[("schet.xml", &xml)]);
    let err = commerceml::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn contractor_id_without_inn_fails() {
    let xml = INVOICE_XML.replace("<Ид>7700000000_770001001</Ид>", "<Ид>abc</Ид>");
    let dir = write_dir(&[("schet.xml", &xml)]);
    let err = commerceml::parse(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
    fs::remove_dir_all(&dir).ok();
}
