#![allow(dead_code)]

use std::fs;
use std::path::Path;

use rusqlite::Connection;

pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Abt-Buy fixture: 2 + 2 tab-separated items with comma-heavy text, three
/// gold matches, one pointing at a missing Buy item.
pub fn abt_buy(root: &Path) {
    let dir = root.join("abt_buy");
    write(
        &dir.join("TableA.csv"),
        "1\tSony Bravia 40\" LCD\tFull HD, 1080p, 120Hz, HDMI\n2\tCanon EOS 5D\t<b>DSLR</b> body, 21MP, CF slot\n",
    );
    write(
        &dir.join("TableB.csv"),
        "10\tSony KDL-40\tLCD TV, 40 inch, 1080p\tSony\t$899.99\n20\tCanon 5D Mk II\tcamera\tCanon\t$1,999.00\n",
    );
    write(&dir.join("matches.csv"), "1\t10\n2\t20\n2\t30\n");
}

/// ESCI fixture with one out-of-vocabulary label.
pub fn esci(root: &Path) {
    let dir = root.join("esci");
    write(
        &dir.join("shopping_queries_dataset_products.csv"),
        "product_id,product_title,product_description,product_bullet_point,product_brand,product_color,product_locale\n\
         B01,Running Shoe,Light,Breathable,Acme,Red,us\n\
         B02,Trail Shoe,,Grippy,Acme,,us\n\
         B03,Laufschuh,,,Acme,Rot,de\n",
    );
    write(
        &dir.join("shopping_queries_dataset_examples.csv"),
        "example_id,query,query_id,product_id,product_locale,esci_label,small_version,large_version,split\n\
         0,running shoes,1,B01,us,E,1,1,train\n\
         1,running shoes,1,B02,us,S,1,1,train\n\
         2,laufschuhe,2,B03,de,Exact,0,1,test\n\
         3,laufschuhe,2,B03,de,Maybe,0,1,test\n",
    );
}

/// Same offer key in `en_train` and `de_train`.
pub fn wdc(root: &Path) {
    let offers = "id,title,description,price,pricecurrency,brand\n\
                  p1,Trail Shoe,grippy,49.90,EUR,Acme\n\
                  p2,Road Shoe,fast,59.00,EUR,Acme\n";
    for variant in ["en_train", "de_train"] {
        let dir = root.join("wdc").join(variant);
        write(&dir.join("offers.csv"), offers);
        write(&dir.join("pairs.csv"), "left_id,right_id,label\np1,p2,0\n");
    }
}

/// Minimal DIGINETICA fixture.
pub fn cikm16(root: &Path) {
    let dir = root.join("cikm16");
    write(&dir.join("products.csv"), "itemId;pricelog2;product.name.tokens\n1;10;4,5\n2;11;6\n");
    write(&dir.join("product-categories.csv"), "itemId;categoryId\n1;100\n");
    write(
        &dir.join("train-queries.csv"),
        "queryId;sessionId;userId;timeframe;duration;eventdate;searchstring.tokens;categoryId;items;is.test\n\
         7;s1;;0;100;2016-05-09;16655;;1,2;FALSE\n",
    );
    write(&dir.join("train-clicks.csv"), "queryId;timeframe;itemId\n7;500;2\n");
    write(
        &dir.join("train-item-views.csv"),
        "sessionId;userId;itemId;timeframe;eventdate\ns1;;1;100;2016-05-09\ns1;;2;200;2016-05-09\n",
    );
    write(
        &dir.join("train-purchases.csv"),
        "sessionId;userId;timeframe;eventdate;ordernumber;itemId\ns1;;300;2016-05-09;1;2\n",
    );
}

pub fn all(root: &Path) {
    abt_buy(root);
    esci(root);
    wdc(root);
    cikm16(root);
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

pub fn strings(conn: &Connection, sql: &str) -> Vec<String> {
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}
