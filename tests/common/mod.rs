//! Shared PDF fixtures for integration tests.

#![allow(dead_code)]

/// Classic-xref PDF whose objects are `objects[i]` numbered from 1.
///
/// Object 1 must be the catalog.
pub fn build_pdf(objects: &[&str], trailer_extra: &str) -> Vec<u8> {
    let mut pdf = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            trailer_extra,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// One-page document with an /Info dictionary and an /ID.
pub fn simple_pdf() -> Vec<u8> {
    build_pdf(
        &[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 5 0 R >>",
            "<< /Producer (fixture) /Title (Contract) >>",
            "<< /Length 43 >>\nstream\nBT /F1 12 Tf 72 712 Td (Hello, world) Tj ET\nendstream",
        ],
        "/Info 4 0 R /ID [<00112233445566778899AABBCCDDEEFF> <00112233445566778899AABBCCDDEEFF>]",
    )
}

/// Document with an existing AcroForm (one text field) and an indirect
/// /Annots array on its page.
pub fn pdf_with_form() -> Vec<u8> {
    build_pdf(
        &[
            "<< /Type /Catalog /Pages 2 0 R /AcroForm 4 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots 6 0 R >>",
            "<< /Fields [5 0 R] /DA (/Helv 0 Tf 0 g) >>",
            "<< /Type /Annot /Subtype /Widget /FT /Tx /T (Name) /Rect [50 700 250 720] /P 3 0 R >>",
            "[5 0 R]",
        ],
        "",
    )
}

/// PDF 1.5 document: catalog and page tree live in an object stream and
/// the cross-reference data is an (unfiltered) xref stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let catalog = "<< /Type /Catalog /Pages 3 0 R >>";
    let pages = "<< /Type /Pages /Kids [4 0 R] /Count 1 >>";
    let pairs = format!("2 0 3 {} ", catalog.len() + 1);
    let objstm_data = format!("{}{} {}", pairs, catalog, pages);

    let mut pdf = b"%PDF-1.5\n".to_vec();
    let objstm_offset = pdf.len();
    pdf.extend_from_slice(
        format!(
            "1 0 obj\n<< /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            pairs.len(),
            objstm_data.len(),
            objstm_data
        )
        .as_bytes(),
    );
    let page_offset = pdf.len();
    pdf.extend_from_slice(b"4 0 obj\n<< /Type /Page /Parent 3 0 R /MediaBox [0 0 595 842] >>\nendobj\n");

    let xref_offset = pdf.len();
    let rows: [(u8, u32, u16); 6] = [
        (0, 0, 0xFFFF),
        (1, objstm_offset as u32, 0),
        (2, 1, 0),
        (2, 1, 1),
        (1, page_offset as u32, 0),
        (1, xref_offset as u32, 0),
    ];
    let mut data = Vec::new();
    for (kind, field2, field3) in rows {
        data.push(kind);
        data.extend_from_slice(&field2.to_be_bytes());
        data.extend_from_slice(&field3.to_be_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 2] /Root 2 0 R /Length {} >>\nstream\n",
            data.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&data);
    pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    pdf
}

/// Stand-in for a DER CMS blob carrying the digest.
///
/// Ends in a non-zero byte so the inspector's zero-padding trim returns
/// it unchanged.
pub fn fake_cms(digest: &[u8]) -> Vec<u8> {
    let mut blob = vec![0x30, (digest.len() + 3) as u8, 0x04, digest.len() as u8];
    blob.extend_from_slice(digest);
    blob.extend_from_slice(&[0x05, 0x01]);
    blob
}
